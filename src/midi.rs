use std::sync::Arc;
use std::time::Duration;

use midir::{Ignore, MidiInput, MidiInputConnection};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::key::KeyIndex;
use crate::state::AppState;

/// A key event decoded from a MIDI message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Press(KeyIndex),
    Release(KeyIndex),
}

/// Decodes note-on/note-off messages for notes on the keyboard.
/// A note-on with zero velocity is a release.
pub fn parse_message(message: &[u8]) -> Option<KeyEvent> {
    let [status, note, velocity, ..] = *message else {
        return None;
    };
    let key = KeyIndex::from_midi(note).ok()?;
    match (status & 0xF0, velocity) {
        (0x90, v) if v > 0 => Some(KeyEvent::Press(key)),
        (0x80, _) | (0x90, 0) => Some(KeyEvent::Release(key)),
        _ => None,
    }
}

/// Listens on a MIDI input port and plays the instrument from it.
pub async fn run_midi_listener(state: Arc<AppState>, port_index: usize) {
    let result = tokio::task::spawn_blocking(move || {
        let _conn = match connect(state, port_index) {
            Ok(conn) => conn,
            Err(e) => {
                warn!("MIDI input disabled: {}", e);
                return;
            }
        };
        info!("MIDI listener connected and running");

        // Keep the thread alive to listen for MIDI events
        loop {
            std::thread::sleep(Duration::from_millis(100));
        }
    })
    .await;

    if let Err(e) = result {
        error!("MIDI listener task failed: {}", e);
    }
}

fn connect(state: Arc<AppState>, port_index: usize) -> Result<MidiInputConnection<Arc<AppState>>> {
    let mut midi_input = MidiInput::new("Tuning Playground").map_err(|e| Error::Midi(e.to_string()))?;
    midi_input.ignore(Ignore::None);

    let in_ports = midi_input.ports();
    if in_ports.is_empty() {
        return Err(Error::Midi("no MIDI input devices found".into()));
    }

    info!("Available MIDI input ports:");
    for (i, port) in in_ports.iter().enumerate() {
        info!(
            "Port {}: {}",
            i,
            midi_input.port_name(port).unwrap_or_else(|_| "Unknown".to_string())
        );
    }

    let in_port = in_ports
        .get(port_index)
        .ok_or_else(|| Error::Midi(format!("no MIDI input port {port_index}")))?;
    info!(
        "Using MIDI input: {}",
        midi_input.port_name(in_port).unwrap_or_else(|_| "Unknown".to_string())
    );

    midi_input
        .connect(
            in_port,
            "tuning-playground-in",
            move |_, message, state| match parse_message(message) {
                Some(KeyEvent::Press(key)) => {
                    debug!(%key, "MIDI note on");
                    if let Err(e) = state.instrument().press(key) {
                        warn!("Cannot play {}: {}", key, e);
                    }
                }
                Some(KeyEvent::Release(key)) => {
                    debug!(%key, "MIDI note off");
                    state.instrument().release(key);
                }
                None => debug!("Unhandled MIDI message: {:?}", message),
            },
            state,
        )
        .map_err(|e| Error::Midi(e.to_string()))
}
