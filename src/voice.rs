//! A single sound generator: a small additive oscillator under an envelope.

use std::f32::consts::TAU;
use std::time::Duration;

use clap::ValueEnum;

use crate::envelope::{Envelope, EnvelopePhase};
use crate::key::KeyIndex;
use crate::smooth::Smoothed;

/// Time constant of frequency glides when a sounding voice is retuned.
pub const RETUNE_TIME_CONSTANT: f32 = 0.01;

/// Partial multipliers and gains of the piano-ish timbre.
const PIANOISH_PARTIALS: [(f32, f32); 3] = [(1.0, 1.0), (2.0, 0.30), (3.0, 0.12)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
    /// Sine fundamental with quieter second and third harmonics.
    #[default]
    #[value(name = "pianoish")]
    PianoIsh,
}

impl Waveform {
    #[inline]
    fn sample(self, phase: f32) -> f32 {
        match self {
            Waveform::Sine | Waveform::PianoIsh => (TAU * phase).sin(),
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => 2.0 * phase - 1.0,
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Voice {
    key: Option<KeyIndex>,
    started_at: Duration,
    frequency: Smoothed,
    phases: [f32; 3],
    envelope: Envelope,
    sample_rate: f32,
}

impl Voice {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            key: None,
            started_at: Duration::ZERO,
            frequency: Smoothed::new(0.0),
            phases: [0.0; 3],
            envelope: Envelope::new(sample_rate),
            sample_rate,
        }
    }

    /// Key this voice is currently sounding for. `None` while idle or releasing.
    pub fn key(&self) -> Option<KeyIndex> {
        self.key
    }

    pub fn started_at(&self) -> Duration {
        self.started_at
    }

    pub fn phase(&self) -> EnvelopePhase {
        self.envelope.phase()
    }

    pub fn level(&self) -> f32 {
        self.envelope.level()
    }

    pub fn is_idle(&self) -> bool {
        self.envelope.is_idle()
    }

    pub fn frequency(&self) -> f32 {
        self.frequency.current()
    }

    pub fn target_frequency(&self) -> f32 {
        self.frequency.target()
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.frequency.set_sample_rate(sample_rate);
        self.envelope.set_sample_rate(sample_rate);
    }

    /// Binds the voice to `key` and retriggers the envelope from its current level.
    pub fn start(&mut self, key: KeyIndex, hz: f32, now: Duration) {
        self.key = Some(key);
        self.started_at = now;
        self.frequency.set_immediate(hz);
        self.envelope.gate_on();
    }

    /// Glides to a new frequency without touching the envelope.
    pub fn retune(&mut self, hz: f32) {
        self.frequency
            .set_target(hz, RETUNE_TIME_CONSTANT, self.sample_rate);
    }

    pub fn release(&mut self, time_constant: f32) {
        self.key = None;
        self.envelope.gate_off(time_constant);
    }

    pub fn kill(&mut self) {
        self.key = None;
        self.envelope.kill();
    }

    #[inline]
    pub fn next_sample(&mut self, waveform: Waveform) -> f32 {
        if self.envelope.is_idle() {
            return 0.0;
        }
        let hz = self.frequency.next_sample();
        let raw = match waveform {
            Waveform::PianoIsh => PIANOISH_PARTIALS
                .iter()
                .zip(self.phases.iter_mut())
                .map(|(&(multiple, gain), phase)| {
                    let s = gain * waveform.sample(*phase);
                    *phase = (*phase + hz * multiple / self.sample_rate).fract();
                    s
                })
                .sum::<f32>(),
            _ => {
                let s = waveform.sample(self.phases[0]);
                self.phases[0] = (self.phases[0] + hz / self.sample_rate).fract();
                s
            }
        };
        raw * self.envelope.next_sample()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waveforms_stay_in_range() {
        for waveform in Waveform::value_variants() {
            for i in 0..100 {
                let s = waveform.sample(i as f32 / 100.0);
                assert!((-1.0..=1.0).contains(&s), "{waveform:?} {s}");
            }
        }
    }

    #[test]
    fn retune_glides_instead_of_stepping() {
        let mut voice = Voice::new(48000.0);
        voice.start(KeyIndex::REFERENCE, 440.0, Duration::ZERO);
        voice.retune(880.0);
        voice.next_sample(Waveform::Sine);
        assert!(voice.frequency() > 440.0 && voice.frequency() < 450.0);
        assert_eq!(voice.target_frequency(), 880.0);
        assert_eq!(voice.phase(), EnvelopePhase::Attacking);
    }

    #[test]
    fn release_unbinds_key() {
        let mut voice = Voice::new(48000.0);
        voice.start(KeyIndex::LOWEST, 27.5, Duration::from_millis(3));
        assert_eq!(voice.key(), Some(KeyIndex::LOWEST));
        assert_eq!(voice.started_at(), Duration::from_millis(3));
        voice.release(0.06);
        assert_eq!(voice.key(), None);
        assert_eq!(voice.phase(), EnvelopePhase::Releasing);
    }
}
