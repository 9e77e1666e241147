//! Capture sequencer: plays keys one at a time with a hold and a gap, so a
//! tuner can measure each of them in turn.
//!
//! ```text
//! Idle --start--> Holding --hold elapsed--> Gap --gap elapsed--> Holding (next key)
//!                                                            \-> Idle (sequence done)
//! ```
//!
//! `next`, `repeat` and `stop` work from any non-idle state and cancel the
//! pending transition first.

use std::ops::RangeInclusive;
use std::time::Duration;

use clap::ValueEnum;
use tracing::{debug, info};

use crate::error::Result;
use crate::key::{KeyIndex, MIDI_END};
use crate::scheduler::{Scheduler, TimerHandle};

pub const DEFAULT_HOLD: Duration = Duration::from_millis(2500);
pub const DEFAULT_GAP: Duration = Duration::from_millis(400);

/// Whatever the sequencer plays through. The voice pool in the application,
/// a recorder in tests.
pub trait NotePlayer {
    fn stop_all(&mut self);
    fn press(&mut self, key: KeyIndex) -> Result<()>;
    fn release(&mut self, key: KeyIndex);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CapturePreset {
    /// Every A from A0.
    #[default]
    AOctaves,
    /// Every C from C1.
    COctaves,
    /// C, F and A in octaves 1 to 7, plus the two end keys.
    OctaveAnchors,
    /// Every sixth key from A0.
    EverySixth,
    /// A user-supplied list of note names.
    Custom,
}

/// How the keys of a capture run are chosen.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Every `step`-th key from `start` up to the top of the keyboard.
    Interval { start: KeyIndex, step: usize },
    /// The named pitch classes in each octave, bookended by the lowest and highest key.
    Anchors {
        names: Vec<String>,
        octaves: RangeInclusive<i32>,
    },
    /// Note names separated by whitespace or commas.
    Custom(String),
}

impl Selection {
    /// `custom` is only read by [`CapturePreset::Custom`].
    pub fn from_preset(preset: CapturePreset, custom: &str) -> Self {
        let interval = |midi: u8, step: usize| Selection::Interval {
            start: KeyIndex::from_midi(midi).unwrap_or(KeyIndex::LOWEST),
            step,
        };
        match preset {
            CapturePreset::AOctaves => interval(21, 12),
            CapturePreset::COctaves => interval(24, 12),
            CapturePreset::EverySixth => interval(21, 6),
            CapturePreset::OctaveAnchors => Selection::Anchors {
                names: ["C", "F", "A"].map(String::from).to_vec(),
                octaves: 1..=7,
            },
            CapturePreset::Custom => Selection::Custom(custom.to_string()),
        }
    }

    /// Keys to play, in order, each at most once.
    pub fn build_sequence(&self) -> Vec<KeyIndex> {
        let keys: Vec<KeyIndex> = match self {
            Selection::Interval { start, step } => (start.midi()..=MIDI_END)
                .step_by((*step).max(1))
                .filter_map(|midi| KeyIndex::from_midi(midi).ok())
                .collect(),
            Selection::Anchors { names, octaves } => {
                let mut keys = vec![KeyIndex::LOWEST];
                for octave in octaves.clone() {
                    keys.extend(
                        names
                            .iter()
                            .filter_map(|name| KeyIndex::from_name(&format!("{name}{octave}"))),
                    );
                }
                keys.push(KeyIndex::HIGHEST);
                keys
            }
            Selection::Custom(text) => text
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|token| !token.is_empty())
                .filter_map(KeyIndex::from_name)
                .collect(),
        };

        let mut seen = [false; crate::key::KEY_COUNT];
        keys.into_iter()
            .filter(|key| !std::mem::replace(&mut seen[key.index()], true))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Holding,
    Gap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { len: usize },
    /// The selection resolved to no keys; nothing was started.
    NothingToPlay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Release(KeyIndex),
    Advance,
}

#[derive(Debug)]
pub struct PlaybackSession {
    hold: Duration,
    gap: Duration,
    sequence: Vec<KeyIndex>,
    position: usize,
    state: CaptureState,
    timers: Scheduler<Step>,
    pending: Option<TimerHandle>,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self::new(DEFAULT_HOLD, DEFAULT_GAP)
    }
}

impl PlaybackSession {
    pub fn new(hold: Duration, gap: Duration) -> Self {
        Self {
            hold,
            gap,
            sequence: Vec::new(),
            position: 0,
            state: CaptureState::Idle,
            timers: Scheduler::new(),
            pending: None,
        }
    }

    /// Takes effect from the next key played.
    pub fn set_timing(&mut self, hold: Duration, gap: Duration) {
        self.hold = hold;
        self.gap = gap;
    }

    pub fn hold(&self) -> Duration {
        self.hold
    }

    pub fn gap(&self) -> Duration {
        self.gap
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state != CaptureState::Idle
    }

    pub fn sequence(&self) -> &[KeyIndex] {
        &self.sequence
    }

    /// Key at the current position while running.
    pub fn current(&self) -> Option<KeyIndex> {
        self.is_running()
            .then(|| self.sequence.get(self.position).copied())
            .flatten()
    }

    /// One-based position and sequence length while running.
    pub fn progress(&self) -> Option<(usize, usize)> {
        self.is_running()
            .then_some((self.position + 1, self.sequence.len()))
    }

    pub fn start(
        &mut self,
        selection: &Selection,
        now: Duration,
        player: &mut impl NotePlayer,
    ) -> Result<StartOutcome> {
        let sequence = selection.build_sequence();
        if sequence.is_empty() {
            info!("capture: no notes in sequence");
            return Ok(StartOutcome::NothingToPlay);
        }
        self.cancel_pending();
        let len = sequence.len();
        self.sequence = sequence;
        info!(len, "capture started");
        self.play_index(0, now, player)?;
        Ok(StartOutcome::Started { len })
    }

    pub fn next(&mut self, now: Duration, player: &mut impl NotePlayer) -> Result<()> {
        if self.is_running() {
            self.play_index(self.position + 1, now, player)?;
        }
        Ok(())
    }

    pub fn repeat(&mut self, now: Duration, player: &mut impl NotePlayer) -> Result<()> {
        if self.is_running() {
            self.play_index(self.position, now, player)?;
        }
        Ok(())
    }

    pub fn stop(&mut self, player: &mut impl NotePlayer) {
        self.cancel_pending();
        self.timers.cancel_all();
        player.stop_all();
        if self.is_running() {
            info!("capture stopped");
        }
        self.state = CaptureState::Idle;
    }

    /// Fires every transition that has come due by `now`.
    pub fn tick(&mut self, now: Duration, player: &mut impl NotePlayer) -> Result<()> {
        while let Some((due, step)) = self.timers.pop_due(now) {
            self.pending = None;
            match step {
                Step::Release(key) => {
                    player.release(key);
                    self.state = CaptureState::Gap;
                    self.pending = Some(self.timers.schedule(due + self.gap, Step::Advance));
                }
                Step::Advance => {
                    if self.position + 1 < self.sequence.len() {
                        self.play_index(self.position + 1, due, player)?;
                    } else {
                        self.stop(player);
                    }
                }
            }
        }
        Ok(())
    }

    fn play_index(&mut self, index: usize, now: Duration, player: &mut impl NotePlayer) -> Result<()> {
        self.cancel_pending();
        self.position = index.min(self.sequence.len().saturating_sub(1));
        let Some(&key) = self.sequence.get(self.position) else {
            self.stop(player);
            return Ok(());
        };

        player.stop_all();
        if let Err(e) = player.press(key) {
            self.stop(player);
            return Err(e);
        }
        debug!(%key, position = self.position, "capture step");
        self.state = CaptureState::Holding;
        self.pending = Some(self.timers.schedule(now + self.hold, Step::Release(key)));
        Ok(())
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            self.timers.cancel(handle);
        }
    }
}
