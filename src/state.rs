use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::capture::{NotePlayer, PlaybackSession, Selection, StartOutcome};
use crate::error::Result;
use crate::key::KeyIndex;
use crate::pitch::PitchReading;
use crate::pool::{ReleaseMode, VoicePool};
use crate::tuning::Tuning;

/// Number of samples kept for the waveform display.
pub const WAVEFORM_LEN: usize = 1024;

/// Centralized state shared across MIDI, audio, and UI components.
#[derive(Debug)]
pub struct AppState {
    pub instrument: Mutex<Instrument>,

    /// The most recent block of output samples, for visualization.
    pub waveform_buffer: Mutex<Vec<f32>>,
}

impl AppState {
    pub fn new(instrument: Instrument) -> Arc<Self> {
        Arc::new(Self {
            instrument: Mutex::new(instrument),
            waveform_buffer: Mutex::new(vec![0.0; WAVEFORM_LEN]),
        })
    }

    /// Locks the instrument. A panic on another thread does not take the
    /// instrument down with it.
    pub fn instrument(&self) -> MutexGuard<'_, Instrument> {
        self.instrument.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn waveform(&self) -> MutexGuard<'_, Vec<f32>> {
        self.waveform_buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// The playable keyboard: tuning, voices and the capture sequencer.
#[derive(Debug)]
pub struct Instrument {
    pub tuning: Tuning,
    pub pool: VoicePool,
    pub capture: PlaybackSession,
    /// Key shown in the pitch readout and edited by detune gestures.
    pub selected: KeyIndex,
    epoch: Instant,
    /// Whether the last retune was refused, so the warning is logged once.
    retune_failed: bool,
}

/// Plays the capture sequence through the voice pool.
struct Performer<'a> {
    pool: &'a mut VoicePool,
    tuning: &'a Tuning,
    now: Duration,
}

impl NotePlayer for Performer<'_> {
    fn stop_all(&mut self) {
        self.pool.stop_all();
    }

    fn press(&mut self, key: KeyIndex) -> Result<()> {
        self.pool.press(key, self.now, self.tuning)
    }

    fn release(&mut self, key: KeyIndex) {
        self.pool.release(key, ReleaseMode::Soft);
    }
}

impl Instrument {
    pub fn new(tuning: Tuning, pool: VoicePool, capture: PlaybackSession) -> Self {
        Self {
            tuning,
            pool,
            capture,
            selected: KeyIndex::REFERENCE,
            epoch: Instant::now(),
            retune_failed: false,
        }
    }

    /// Time since the instrument was created.
    pub fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    pub fn press(&mut self, key: KeyIndex) -> Result<()> {
        let now = self.now();
        self.press_at(key, now)
    }

    pub fn press_at(&mut self, key: KeyIndex, now: Duration) -> Result<()> {
        self.selected = key;
        self.pool.press(key, now, &self.tuning)
    }

    pub fn release(&mut self, key: KeyIndex) {
        self.pool.release(key, ReleaseMode::Soft);
    }

    pub fn stop_all(&mut self) {
        self.pool.stop_all();
    }

    /// Whether the last tick could not retune because the tuning is invalid.
    pub fn retune_failed(&self) -> bool {
        self.retune_failed
    }

    pub fn reading(&self) -> Result<PitchReading> {
        self.tuning.reading(self.selected)
    }

    /// Per-frame work: keep sounding voices in tune and run due capture steps.
    pub fn tick(&mut self) {
        let now = self.now();
        self.tick_at(now);
    }

    pub fn tick_at(&mut self, now: Duration) {
        match self.pool.retune_all(&self.tuning) {
            Ok(()) if self.retune_failed => {
                info!("tuning valid again, retuning resumed");
                self.retune_failed = false;
            }
            Ok(()) => {}
            Err(e) if !self.retune_failed => {
                warn!("retune skipped until the tuning is fixed: {}", e);
                self.retune_failed = true;
            }
            Err(e) => debug!("retune skipped: {}", e),
        }
        let (capture, mut performer) = self.split(now);
        if let Err(e) = capture.tick(now, &mut performer) {
            warn!("capture step failed: {}", e);
        }
        self.follow_capture();
    }

    pub fn start_capture(&mut self, selection: &Selection) -> Result<StartOutcome> {
        let now = self.now();
        self.start_capture_at(selection, now)
    }

    pub fn start_capture_at(&mut self, selection: &Selection, now: Duration) -> Result<StartOutcome> {
        let (capture, mut performer) = self.split(now);
        let outcome = capture.start(selection, now, &mut performer)?;
        self.follow_capture();
        Ok(outcome)
    }

    pub fn next_capture(&mut self) -> Result<()> {
        let now = self.now();
        let (capture, mut performer) = self.split(now);
        capture.next(now, &mut performer)?;
        self.follow_capture();
        Ok(())
    }

    pub fn repeat_capture(&mut self) -> Result<()> {
        let now = self.now();
        let (capture, mut performer) = self.split(now);
        capture.repeat(now, &mut performer)?;
        self.follow_capture();
        Ok(())
    }

    pub fn stop_capture(&mut self) {
        let now = self.now();
        let (capture, mut performer) = self.split(now);
        capture.stop(&mut performer);
    }

    fn split(&mut self, now: Duration) -> (&mut PlaybackSession, Performer<'_>) {
        (
            &mut self.capture,
            Performer {
                pool: &mut self.pool,
                tuning: &self.tuning,
                now,
            },
        )
    }

    fn follow_capture(&mut self) {
        if let Some(key) = self.capture.current() {
            self.selected = key;
        }
    }
}
