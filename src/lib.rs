//! Stretch-tuned 88-key keyboard: pitch model, voice pool and capture sequencer.

pub mod audio;
pub mod capture;
pub mod config;
pub mod curve;
pub mod envelope;
pub mod error;
pub mod key;
pub mod midi;
pub mod pitch;
pub mod pool;
pub mod scheduler;
pub mod smooth;
pub mod state;
pub mod tuning;
pub mod ui;
pub mod voice;

pub use error::{Error, ImportError, Result};
pub use key::KeyIndex;
pub use pitch::{PitchReading, StretchParams, TuningConfig, TuningMode, TuningTarget};
pub use pool::{ReleaseMode, VoicePool};
pub use tuning::Tuning;
