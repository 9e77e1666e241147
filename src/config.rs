//! Command-line configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::Level;

use crate::capture::{CapturePreset, PlaybackSession, Selection};
use crate::pitch::{StretchPreset, TuningConfig, TuningMode, TuningTarget};
use crate::pool::{VoicePool, DEFAULT_POLYPHONY, DEFAULT_SAMPLE_RATE};
use crate::tuning::Tuning;
use crate::voice::Waveform;

#[derive(Debug, Clone, Parser)]
#[command(version, about = "Play and capture a stretch-tuned 88-key keyboard")]
pub struct Cli {
    /// Frequency of A4 in Hz.
    #[arg(long, default_value_t = 440.0)]
    pub reference_hz: f64,

    /// Where per-key deviation from equal temperament comes from.
    #[arg(long, value_enum, default_value_t = TuningMode::Stretch)]
    pub mode: TuningMode,

    /// Stretch curve preset.
    #[arg(long, value_enum, default_value_t = StretchPreset::Medium)]
    pub preset: StretchPreset,

    /// What snap-to-target tunes a key to.
    #[arg(long, value_enum, default_value_t = TuningTarget::EqualTempered)]
    pub target: TuningTarget,

    #[arg(long, value_enum, default_value_t = Waveform::PianoIsh)]
    pub waveform: Waveform,

    /// Maximum number of simultaneously sounding voices.
    #[arg(long, default_value_t = DEFAULT_POLYPHONY)]
    pub polyphony: usize,

    /// Master volume, 0 to 1.
    #[arg(long, default_value_t = 0.5)]
    pub volume: f32,

    /// Let released notes ring out longer.
    #[arg(long)]
    pub sustain: bool,

    /// Curve payload to import at startup.
    #[arg(long)]
    pub import: Option<PathBuf>,

    /// Write the current reality curve to this file and exit.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Index of the MIDI input port to listen on.
    #[arg(long, default_value_t = 0)]
    pub midi_port: usize,

    /// Run a capture sequence without the window, then exit.
    #[arg(long, value_enum)]
    pub capture: Option<CapturePreset>,

    /// Note names for the custom capture preset, e.g. "A0 C4 E5".
    #[arg(long, default_value = "")]
    pub custom: String,

    /// Seconds each captured key is held.
    #[arg(long, default_value_t = 2.5)]
    pub hold: f64,

    /// Milliseconds of silence between captured keys.
    #[arg(long, default_value_t = 400)]
    pub gap: u64,

    /// More logging; repeat for more detail.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn log_level(&self) -> Level {
        match self.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }

    pub fn tuning(&self) -> Tuning {
        Tuning::new(TuningConfig {
            reference_hz: self.reference_hz,
            mode: self.mode,
            stretch: self.preset.params(),
            target: self.target,
        })
    }

    pub fn voice_pool(&self) -> VoicePool {
        let mut pool = VoicePool::new(self.polyphony, DEFAULT_SAMPLE_RATE);
        pool.set_waveform(self.waveform);
        pool.set_volume(self.volume);
        pool.set_sustain(self.sustain);
        pool
    }

    pub fn playback_session(&self) -> PlaybackSession {
        let hold = Duration::try_from_secs_f64(self.hold).unwrap_or(crate::capture::DEFAULT_HOLD);
        PlaybackSession::new(hold, Duration::from_millis(self.gap))
    }

    pub fn selection(&self, preset: CapturePreset) -> Selection {
        Selection::from_preset(preset, &self.custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["tuning_playground"]);
        assert_eq!(cli.tuning().config, TuningConfig::default());
        assert_eq!(cli.voice_pool().polyphony_limit(), DEFAULT_POLYPHONY);
        assert_eq!(cli.log_level(), Level::INFO);
        assert!(cli.capture.is_none());
    }

    #[test]
    fn parses_capture_options() {
        let cli = Cli::parse_from([
            "tuning_playground",
            "--mode",
            "et",
            "--preset",
            "strong",
            "--capture",
            "custom",
            "--custom",
            "A0 C8",
            "--hold",
            "0.5",
            "--gap",
            "100",
            "-vv",
        ]);
        assert_eq!(cli.mode, TuningMode::EqualTempered);
        assert_eq!(cli.tuning().config.stretch, StretchPreset::Strong.params());
        assert_eq!(cli.capture, Some(CapturePreset::Custom));
        assert_eq!(cli.selection(CapturePreset::Custom).build_sequence().len(), 2);
        let session = cli.playback_session();
        assert_eq!(session.hold(), Duration::from_millis(500));
        assert_eq!(session.gap(), Duration::from_millis(100));
        assert_eq!(cli.log_level(), Level::TRACE);
    }
}
