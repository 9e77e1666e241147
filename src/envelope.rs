//! Amplitude envelope of a voice.
//!
//! ```text
//!   level
//!   1.0 ┤  ╭─╮
//!  0.75 ┤ ╱   ╰──────────╮
//!       │╱                ╲__
//!   0.0 ┼──────────────────────→ time
//!       attack  sustain    release
//! ```
//!
//! Every stage is an exponential approach ([`Smoothed`]) starting from the
//! current level, so retriggering or releasing mid-stage never clicks. The only
//! discontinuity is [`Envelope::kill`], used for hard stops.

use crate::smooth::Smoothed;

pub const PEAK_LEVEL: f32 = 1.0;
pub const SUSTAIN_LEVEL: f32 = 0.75;
pub const ATTACK_TIME_CONSTANT: f32 = 0.008;
/// Time after note-on at which the decay to the sustain level begins.
pub const DECAY_DELAY: f32 = 0.06;
pub const DECAY_TIME_CONSTANT: f32 = 0.10;
pub const RELEASE_TIME_CONSTANT: f32 = 0.06;
/// Release time constant while the sustain pedal is down.
pub const SUSTAINED_RELEASE_TIME_CONSTANT: f32 = 0.12;
/// Below this level a releasing voice counts as silent.
pub const SILENCE: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopePhase {
    Idle,
    Attacking,
    Sustaining,
    Releasing,
}

#[derive(Debug, Clone)]
pub struct Envelope {
    phase: EnvelopePhase,
    level: Smoothed,
    sample_rate: f32,
    /// Samples spent in the current phase.
    elapsed: u32,
}

impl Envelope {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            phase: EnvelopePhase::Idle,
            level: Smoothed::new(0.0),
            sample_rate,
            elapsed: 0,
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.level.set_sample_rate(sample_rate);
    }

    pub fn phase(&self) -> EnvelopePhase {
        self.phase
    }

    pub fn level(&self) -> f32 {
        self.level.current()
    }

    pub fn is_idle(&self) -> bool {
        self.phase == EnvelopePhase::Idle
    }

    pub fn gate_on(&mut self) {
        self.phase = EnvelopePhase::Attacking;
        self.elapsed = 0;
        self.level
            .set_target(PEAK_LEVEL, ATTACK_TIME_CONSTANT, self.sample_rate);
    }

    pub fn gate_off(&mut self, time_constant: f32) {
        if self.phase == EnvelopePhase::Idle {
            return;
        }
        self.phase = EnvelopePhase::Releasing;
        self.elapsed = 0;
        self.level.set_target(0.0, time_constant, self.sample_rate);
    }

    /// Silences immediately, with no ramp.
    pub fn kill(&mut self) {
        self.phase = EnvelopePhase::Idle;
        self.elapsed = 0;
        self.level.set_immediate(0.0);
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        match self.phase {
            EnvelopePhase::Idle => return 0.0,
            EnvelopePhase::Attacking => {
                if self.elapsed as f32 >= DECAY_DELAY * self.sample_rate {
                    self.phase = EnvelopePhase::Sustaining;
                    self.level
                        .set_target(SUSTAIN_LEVEL, DECAY_TIME_CONSTANT, self.sample_rate);
                }
            }
            EnvelopePhase::Sustaining => {}
            EnvelopePhase::Releasing => {
                if self.level.current() < SILENCE {
                    self.kill();
                    return 0.0;
                }
            }
        }
        self.elapsed = self.elapsed.saturating_add(1);
        self.level.next_sample()
    }
}
