//! Bounded pool of voices driven by key presses.
//!
//! Voices live in an arena (`Vec<Voice>`, reserved to [`MAX_POLYPHONY`] up
//! front) and are addressed by slot. The active map is a fixed table from
//! key index to slot, so pressing and releasing never allocate.
//!
//! A key is in the active map exactly when one voice is bound to it and
//! sounding. Releasing unbinds the voice at once; it keeps ringing out
//! unbound until its envelope reaches silence.
//!
//! When every slot is taken, `press` steals the voice with the oldest start
//! time, whatever it is doing. Equal start times go to the lowest slot, which
//! is also the first created.

use std::time::Duration;

use tracing::debug;

use crate::envelope::{RELEASE_TIME_CONSTANT, SUSTAINED_RELEASE_TIME_CONSTANT};
use crate::error::Result;
use crate::key::{KeyIndex, KEY_COUNT};
use crate::tuning::Tuning;
use crate::voice::{Voice, Waveform};

pub const MAX_POLYPHONY: usize = 32;
pub const DEFAULT_POLYPHONY: usize = 8;
pub const DEFAULT_SAMPLE_RATE: f32 = 48000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleaseMode {
    /// Ramp down with the release envelope.
    #[default]
    Soft,
    /// Silence immediately.
    Hard,
}

#[derive(Debug)]
pub struct VoicePool {
    voices: Vec<Voice>,
    active: [Option<u8>; KEY_COUNT],
    limit: usize,
    sustain: bool,
    waveform: Waveform,
    volume: f32,
    sample_rate: f32,
}

impl Default for VoicePool {
    fn default() -> Self {
        Self::new(DEFAULT_POLYPHONY, DEFAULT_SAMPLE_RATE)
    }
}

impl VoicePool {
    pub fn new(polyphony: usize, sample_rate: f32) -> Self {
        Self {
            voices: Vec::with_capacity(MAX_POLYPHONY),
            active: [None; KEY_COUNT],
            limit: polyphony.clamp(1, MAX_POLYPHONY),
            sustain: false,
            waveform: Waveform::default(),
            volume: 0.5,
            sample_rate,
        }
    }

    pub fn polyphony_limit(&self) -> usize {
        self.limit
    }

    /// Voices created so far. Never exceeds the polyphony limit.
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn is_active(&self, key: KeyIndex) -> bool {
        self.active[key.index()].is_some()
    }

    pub fn active_keys(&self) -> impl Iterator<Item = KeyIndex> + '_ {
        KeyIndex::all().filter(|key| self.is_active(*key))
    }

    pub fn active_count(&self) -> usize {
        self.active.iter().flatten().count()
    }

    pub fn sustain(&self) -> bool {
        self.sustain
    }

    pub fn set_sustain(&mut self, sustain: bool) {
        self.sustain = sustain;
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for voice in &mut self.voices {
            voice.set_sample_rate(sample_rate);
        }
    }

    /// Starts sounding `key`. Does nothing if the key is already active.
    ///
    /// The pitch is computed before anything changes, so an invalid tuning
    /// leaves the pool untouched.
    pub fn press(&mut self, key: KeyIndex, now: Duration, tuning: &Tuning) -> Result<()> {
        if self.is_active(key) {
            return Ok(());
        }
        let hz = tuning.output_hz(key)? as f32;

        let slot = self.pick_slot();
        self.voices[slot].start(key, hz, now);
        self.active[key.index()] = Some(slot as u8);
        debug!(%key, slot, hz, "press");
        Ok(())
    }

    pub fn release(&mut self, key: KeyIndex, mode: ReleaseMode) {
        let Some(slot) = self.active[key.index()].take() else {
            return;
        };
        let time_constant = self.release_time_constant();
        let voice = &mut self.voices[slot as usize];
        match mode {
            ReleaseMode::Hard => voice.kill(),
            ReleaseMode::Soft => voice.release(time_constant),
        }
    }

    /// Hard-stops every active key.
    pub fn stop_all(&mut self) {
        for key in KeyIndex::all() {
            self.release(key, ReleaseMode::Hard);
        }
    }

    /// Moves every sounding key to its current pitch without retriggering.
    pub fn retune_all(&mut self, tuning: &Tuning) -> Result<()> {
        tuning.config.validate()?;
        for (index, slot) in self.active.iter().enumerate() {
            let Some(slot) = slot else { continue };
            let key = KeyIndex::new(index)?;
            let hz = tuning.output_hz(key)? as f32;
            self.voices[*slot as usize].retune(hz);
        }
        Ok(())
    }

    /// Changes how many voices may exist. Voices beyond a lowered limit are
    /// stopped and discarded; a raised limit lets `press` create more later.
    pub fn set_polyphony_limit(&mut self, limit: usize) {
        let limit = limit.clamp(1, MAX_POLYPHONY);
        if limit < self.voices.len() {
            for (index, slot) in self.active.iter_mut().enumerate() {
                if slot.is_some_and(|s| s as usize >= limit) {
                    debug!(key = index, "dropped by polyphony change");
                    *slot = None;
                }
            }
            self.voices.truncate(limit);
        }
        self.limit = limit;
    }

    fn release_time_constant(&self) -> f32 {
        if self.sustain {
            SUSTAINED_RELEASE_TIME_CONSTANT
        } else {
            RELEASE_TIME_CONSTANT
        }
    }

    /// Returns a slot for a new note, creating or stealing a voice.
    fn pick_slot(&mut self) -> usize {
        if self.voices.len() < self.limit {
            self.voices.push(Voice::new(self.sample_rate));
            return self.voices.len() - 1;
        }

        let mut oldest = 0;
        for (slot, voice) in self.voices.iter().enumerate().skip(1) {
            if voice.started_at() < self.voices[oldest].started_at() {
                oldest = slot;
            }
        }

        if let Some(key) = self.voices[oldest].key() {
            if self.active[key.index()] == Some(oldest as u8) {
                self.active[key.index()] = None;
            }
            debug!(%key, slot = oldest, "voice stolen");
        }
        oldest
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let waveform = self.waveform;
        let mix: f32 = self
            .voices
            .iter_mut()
            .map(|voice| voice.next_sample(waveform))
            .sum();
        mix * self.volume
    }

    pub fn render(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            *sample = self.next_sample();
        }
    }
}
