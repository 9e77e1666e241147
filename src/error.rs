//! Error types for the tuning playground.

use thiserror::Error;

/// Errors reported by pitch computation, curve import, and device setup.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Key out of range: {0}. Must be an index in 0..=87 or a MIDI note in 21..=108")]
    KeyOutOfRange(i64),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Import failed: {0}")]
    Import(#[from] ImportError),

    #[error("No audio output device available")]
    NoOutputDevice,

    #[error("Audio device not available")]
    DeviceNotAvailable(#[from] cpal::DefaultStreamConfigError),

    #[error("Failed to build audio stream")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Failed to play audio stream")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("Window error: {0}")]
    Window(#[from] eframe::Error),

    #[error("MIDI error: {0}")]
    Midi(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a curve payload is rejected. A rejected import changes nothing.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("cents must be an array of 88 numbers")]
    NotAnArray,

    #[error("cents must be an array of 88 numbers, got {0}")]
    WrongLength(usize),

    #[error("cents[{index}] is not a finite number")]
    NonNumeric { index: usize },

    #[error("referenceHz must be a positive number, got {0}")]
    InvalidReference(f64),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
