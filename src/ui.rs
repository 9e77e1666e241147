use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use eframe::{App, CreationContext};
use egui::{CentralPanel, ComboBox, Context, Slider, Ui};
use egui_plot::{Line, Plot, PlotBounds, PlotPoints};
use tracing::warn;

use crate::capture::{CapturePreset, Selection, StartOutcome};
use crate::error::Error;
use crate::key::{qwerty_to_midi, KeyIndex};
use crate::pitch::{StretchPreset, TuningMode, TuningTarget};
use crate::pool::MAX_POLYPHONY;
use crate::state::{AppState, Instrument, WAVEFORM_LEN};
use crate::voice::Waveform;

const DETUNE_STEPS: [f64; 4] = [-1.0, -0.1, 0.1, 1.0];

/// Computer-keyboard keys currently held down and sounding.
#[derive(Debug, Default)]
struct HeldKeys(HashSet<KeyIndex>);

impl HeldKeys {
    /// Forgets keys the pool stopped on its own (stolen, or stopped by a capture run).
    fn sync(&mut self, instrument: &Instrument) {
        self.0.retain(|key| instrument.pool.is_active(*key));
    }

    /// Plays `key` unless it is already held. A key that failed to play is not held.
    fn press(&mut self, key: KeyIndex, instrument: &mut Instrument) {
        if self.0.contains(&key) {
            return;
        }
        match instrument.press(key) {
            Ok(()) => {
                self.0.insert(key);
            }
            Err(e) => warn!("Cannot play {}: {}", key, e),
        }
    }

    fn release(&mut self, key: KeyIndex, instrument: &mut Instrument) {
        self.0.remove(&key);
        instrument.release(key);
    }

    fn clear(&mut self) {
        self.0.clear();
    }

    #[cfg(test)]
    fn contains(&self, key: KeyIndex) -> bool {
        self.0.contains(&key)
    }
}

/// Control panel and pitch readout. Keys are played from MIDI or the computer keyboard.
pub struct TuningApp {
    state: Arc<AppState>,
    held: HeldKeys,
    capture_preset: CapturePreset,
    custom_notes: String,
    capture_status: String,
    curve_json: String,
    import_status: String,
}

impl TuningApp {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            held: HeldKeys::default(),
            capture_preset: CapturePreset::default(),
            custom_notes: String::new(),
            capture_status: String::new(),
            curve_json: String::new(),
            import_status: String::new(),
        }
    }

    /// Plays the QWERTY row, ignoring auto-repeat and typing into text fields.
    fn handle_keys(&mut self, ctx: &Context, instrument: &mut Instrument) {
        if ctx.wants_keyboard_input() {
            return;
        }
        self.held.sync(instrument);
        let events = ctx.input(|i| i.events.clone());
        for event in events {
            let egui::Event::Key {
                key,
                pressed,
                repeat: false,
                ..
            } = event
            else {
                continue;
            };
            let Some(key) = key
                .name()
                .chars()
                .next()
                .and_then(qwerty_to_midi)
                .and_then(|midi| KeyIndex::from_midi(midi).ok())
            else {
                continue;
            };

            if pressed {
                self.held.press(key, instrument);
            } else {
                self.held.release(key, instrument);
            }
        }
    }

    fn tuning_controls(&mut self, ui: &mut Ui, instrument: &mut Instrument) {
        let config = &mut instrument.tuning.config;
        ui.add(Slider::new(&mut config.reference_hz, 415.0..=466.0).text("A4 (Hz)"));

        ComboBox::from_label("Piano reality")
            .selected_text(format!("{:?}", config.mode))
            .show_ui(ui, |ui| {
                ui.selectable_value(&mut config.mode, TuningMode::EqualTempered, "Equal temperament");
                ui.selectable_value(&mut config.mode, TuningMode::Stretch, "Stretch");
                ui.selectable_value(&mut config.mode, TuningMode::Imported, "ET + imported curve");
            });

        ui.horizontal(|ui| {
            for (label, preset) in [
                ("Mild", StretchPreset::Mild),
                ("Medium", StretchPreset::Medium),
                ("Strong", StretchPreset::Strong),
            ] {
                if ui.button(label).clicked() {
                    config.stretch = preset.params();
                }
            }
        });
        ui.add(Slider::new(&mut config.stretch.low_cents, -60.0..=0.0).text("Low extreme (c)"));
        ui.add(Slider::new(&mut config.stretch.high_cents, 0.0..=80.0).text("High extreme (c)"));
        ui.add(Slider::new(&mut config.stretch.shape, 0.5..=3.0).text("Shape"));

        ComboBox::from_label("Tune target")
            .selected_text(format!("{:?}", config.target))
            .show_ui(ui, |ui| {
                ui.selectable_value(&mut config.target, TuningTarget::EqualTempered, "Equal temperament");
                ui.selectable_value(&mut config.target, TuningTarget::Reality, "Reality curve");
            });
    }

    fn readout(&mut self, ui: &mut Ui, instrument: &mut Instrument) {
        let key = instrument.selected;
        ui.label(format!("Selected: {} (MIDI {})", key, key.midi()));
        match instrument.reading() {
            Ok(r) => {
                ui.monospace(format!("ET        {:>10.3} Hz", r.equal_tempered_hz));
                ui.monospace(format!("Reality   {:>10.1} c", r.reality_cents));
                ui.monospace(format!("Reality   {:>10.3} Hz", r.reality_hz));
                ui.monospace(format!("Detune    {:>10.1} c", r.detune_cents));
                ui.monospace(format!("Output    {:>10.3} Hz", r.output_hz));
            }
            Err(e) => {
                ui.colored_label(egui::Color32::RED, e.to_string());
            }
        }

        let mut detune = instrument.tuning.detune.get(key);
        if ui
            .add(Slider::new(&mut detune, -50.0..=50.0).text("Detune (c)"))
            .changed()
        {
            instrument.tuning.set_detune(key, detune);
        }
        ui.horizontal(|ui| {
            for step in DETUNE_STEPS {
                if ui.button(format!("{step:+}")).clicked() {
                    instrument.tuning.nudge_detune(key, step);
                }
            }
            if ui.button("Random").clicked() {
                instrument.tuning.randomize_detune(key, &mut rand::thread_rng());
            }
            if ui.button("Snap to target").clicked() {
                if let Err(e) = instrument.tuning.snap_to_target(key) {
                    warn!("Snap failed: {}", e);
                }
            }
            if ui.button("Reset detune").clicked() {
                instrument.tuning.reset_detune();
            }
        });
    }

    fn sound_controls(&mut self, ui: &mut Ui, instrument: &mut Instrument) {
        let pool = &mut instrument.pool;

        let mut waveform = pool.waveform();
        ComboBox::from_label("Waveform")
            .selected_text(format!("{waveform:?}"))
            .show_ui(ui, |ui| {
                for w in [
                    Waveform::PianoIsh,
                    Waveform::Sine,
                    Waveform::Triangle,
                    Waveform::Sawtooth,
                    Waveform::Square,
                ] {
                    ui.selectable_value(&mut waveform, w, format!("{w:?}"));
                }
            });
        pool.set_waveform(waveform);

        let mut limit = pool.polyphony_limit();
        if ui
            .add(Slider::new(&mut limit, 1..=MAX_POLYPHONY).text("Polyphony"))
            .changed()
        {
            pool.set_polyphony_limit(limit);
        }

        let mut volume = pool.volume();
        if ui.add(Slider::new(&mut volume, 0.0..=1.0).text("Volume")).changed() {
            pool.set_volume(volume);
        }

        let mut sustain = pool.sustain();
        if ui.checkbox(&mut sustain, "Sustain").changed() {
            pool.set_sustain(sustain);
        }

        if ui.button("Stop all").clicked() {
            instrument.stop_all();
            self.held.clear();
        }
    }

    fn capture_controls(&mut self, ui: &mut Ui, instrument: &mut Instrument) {
        ComboBox::from_label("Sequence")
            .selected_text(format!("{:?}", self.capture_preset))
            .show_ui(ui, |ui| {
                for preset in [
                    CapturePreset::AOctaves,
                    CapturePreset::COctaves,
                    CapturePreset::OctaveAnchors,
                    CapturePreset::EverySixth,
                    CapturePreset::Custom,
                ] {
                    ui.selectable_value(&mut self.capture_preset, preset, format!("{preset:?}"));
                }
            });
        if self.capture_preset == CapturePreset::Custom {
            ui.text_edit_singleline(&mut self.custom_notes);
        }

        let mut hold = instrument.capture.hold().as_secs_f64();
        let mut gap = instrument.capture.gap().as_millis() as u64;
        let hold_changed = ui
            .add(Slider::new(&mut hold, 0.5..=8.0).text("Hold (s)"))
            .changed();
        let gap_changed = ui
            .add(Slider::new(&mut gap, 0..=2000).text("Gap (ms)"))
            .changed();
        if hold_changed || gap_changed {
            instrument
                .capture
                .set_timing(Duration::from_secs_f64(hold), Duration::from_millis(gap));
        }

        ui.horizontal(|ui| {
            let running = instrument.capture.is_running();
            if ui.add_enabled(!running, egui::Button::new("Start")).clicked() {
                let selection = Selection::from_preset(self.capture_preset, &self.custom_notes);
                self.capture_status = match instrument.start_capture(&selection) {
                    Ok(StartOutcome::Started { .. }) => String::new(),
                    Ok(StartOutcome::NothingToPlay) => "No notes in sequence".to_string(),
                    Err(e) => e.to_string(),
                };
            }
            if ui.add_enabled(running, egui::Button::new("Next")).clicked() {
                if let Err(e) = instrument.next_capture() {
                    self.capture_status = e.to_string();
                }
            }
            if ui.add_enabled(running, egui::Button::new("Repeat")).clicked() {
                if let Err(e) = instrument.repeat_capture() {
                    self.capture_status = e.to_string();
                }
            }
            if ui.add_enabled(running, egui::Button::new("Stop")).clicked() {
                instrument.stop_capture();
            }
        });

        match (instrument.capture.current(), instrument.capture.progress()) {
            (Some(key), Some((at, len))) => ui.label(format!("Now: {key}   {at} / {len}")),
            _ => ui.label(format!("Now: —   {}", self.capture_status)),
        };
    }

    fn curve_controls(&mut self, ui: &mut Ui, instrument: &mut Instrument) {
        ui.horizontal(|ui| {
            if ui.button("Export reality curve").clicked() {
                let exported = instrument
                    .tuning
                    .export()
                    .and_then(|payload| payload.to_json().map_err(Error::from));
                match exported {
                    Ok(json) => {
                        self.curve_json = json;
                        self.import_status = "Exported current reality curve.".to_string();
                    }
                    Err(e) => self.import_status = e.to_string(),
                }
            }
            if ui.button("Apply import").clicked() {
                self.import_status = match instrument.tuning.import_json(&self.curve_json) {
                    Ok(()) => "Import applied. Switch reality to the imported curve to hear it.".to_string(),
                    Err(e) => e.to_string(),
                };
            }
            if ui.button("Clear import").clicked() {
                instrument.tuning.clear_curve();
                self.import_status = "Imported curve cleared.".to_string();
            }
        });
        ui.label(self.import_status.as_str());
        egui::ScrollArea::vertical()
            .max_height(120.0)
            .show(ui, |ui| ui.code_editor(&mut self.curve_json));
    }
}

impl App for TuningApp {
    /// Called every frame; doubles as the tick that retunes sounding voices.
    fn update(&mut self, ctx: &Context, _: &mut eframe::Frame) {
        ctx.request_repaint();
        let state = Arc::clone(&self.state);

        // Never hold both locks at once: the audio callback takes the
        // instrument first and the waveform second.
        let points: Vec<[f64; 2]> = state
            .waveform()
            .iter()
            .enumerate()
            .map(|(i, &v)| [i as f64, v as f64])
            .collect();
        egui::TopBottomPanel::bottom("waveform").show(ctx, |ui| {
            Plot::new("Waveform")
                .view_aspect(4.0)
                .show_axes([true, true])
                .show(ui, |plot_ui| {
                    plot_ui.set_plot_bounds(PlotBounds::from_min_max(
                        [0.0, -1.1],
                        [WAVEFORM_LEN as f64, 1.1],
                    ));
                    plot_ui.line(Line::new(PlotPoints::from(points)));
                });
        });

        let mut instrument = state.instrument();
        self.handle_keys(ctx, &mut instrument);

        CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.heading("Tuning");
                self.tuning_controls(ui, &mut instrument);
                ui.separator();
                self.readout(ui, &mut instrument);
                ui.separator();
                ui.heading("Sound");
                self.sound_controls(ui, &mut instrument);
                ui.separator();
                ui.heading("Capture");
                self.capture_controls(ui, &mut instrument);
                ui.separator();
                ui.heading("Curve");
                self.curve_controls(ui, &mut instrument);
                ui.separator();
                let active: Vec<String> =
                    instrument.pool.active_keys().map(|k| k.to_string()).collect();
                ui.label(format!("Sounding: {}", active.join(" ")));
            });
        });

        instrument.tick();
    }
}

/// Initializes and runs the eframe application.
pub fn run_ui(state: Arc<AppState>) -> Result<(), eframe::Error> {
    let options = eframe::NativeOptions::default();
    eframe::run_native(
        "Tuning Playground",
        options,
        Box::new(|_cc: &CreationContext| Ok(Box::new(TuningApp::new(state.clone())))),
    )
}
