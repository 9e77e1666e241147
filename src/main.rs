use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use tuning_playground::capture::{CapturePreset, StartOutcome};
use tuning_playground::config::Cli;
use tuning_playground::state::{AppState, Instrument};
use tuning_playground::{audio, midi, ui, Result};

/// Tick period of the headless capture loop, about one display frame.
const TICK: Duration = Duration::from_millis(16);

/// How long to wait for tasks on shutdown. The audio and MIDI threads never
/// finish on their own.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let result = runtime.block_on(run(cli));
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut tuning = cli.tuning();
    if let Some(path) = &cli.import {
        let json = tokio::fs::read_to_string(path).await?;
        tuning.import_json(&json)?;
        info!("Imported curve from {}", path.display());
    }

    if let Some(path) = &cli.export {
        let json = tuning.export()?.to_json()?;
        tokio::fs::write(path, json).await?;
        info!("Exported reality curve to {}", path.display());
        return Ok(());
    }

    let instrument = Instrument::new(tuning, cli.voice_pool(), cli.playback_session());
    let state = AppState::new(instrument);

    tokio::spawn(audio::run_audio_output(Arc::clone(&state)));
    tokio::spawn(midi::run_midi_listener(Arc::clone(&state), cli.midi_port));

    match cli.capture {
        Some(preset) => run_capture(&cli, preset, state).await,
        None => Ok(ui::run_ui(state)?),
    }
}

/// Plays one capture sequence through the audio device, then returns.
async fn run_capture(cli: &Cli, preset: CapturePreset, state: Arc<AppState>) -> Result<()> {
    let selection = cli.selection(preset);
    match state.instrument().start_capture(&selection)? {
        StartOutcome::NothingToPlay => {
            info!("No notes in sequence");
            return Ok(());
        }
        StartOutcome::Started { len } => info!("Capturing {} keys", len),
    }

    let mut interval = tokio::time::interval(TICK);
    loop {
        interval.tick().await;
        let mut instrument = state.instrument();
        instrument.tick();
        if !instrument.capture.is_running() {
            break;
        }
    }
    info!("Capture finished");
    Ok(())
}
