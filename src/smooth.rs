//! One-pole smoothing toward a target, the per-sample form of an
//! exponential approach with a time constant.
//!
//! After one time constant the value has covered ~63% of the distance to the
//! target, after five ~99%. Changing the target mid-flight continues from the
//! current value, so nothing ever jumps unless [`Smoothed::set_immediate`] is used.

#[derive(Debug, Clone, Copy)]
pub struct Smoothed {
    current: f32,
    target: f32,
    time_constant: f32,
    coeff: f32,
}

impl Smoothed {
    pub fn new(initial: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            time_constant: 0.0,
            coeff: 1.0,
        }
    }

    /// Starts moving toward `target` with the given time constant.
    pub fn set_target(&mut self, target: f32, time_constant_secs: f32, sample_rate: f32) {
        self.target = target;
        self.time_constant = time_constant_secs;
        self.coeff = coefficient(time_constant_secs, sample_rate);
    }

    /// Keeps the current time constant in seconds under a new sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.coeff = coefficient(self.time_constant, sample_rate);
    }

    pub fn set_immediate(&mut self, value: f32) {
        self.current = value;
        self.target = value;
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        self.current += (self.target - self.current) * self.coeff;
        self.current
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }
}

/// Fraction of the remaining distance covered per sample.
fn coefficient(time_constant_secs: f32, sample_rate: f32) -> f32 {
    let samples = time_constant_secs * sample_rate;
    if samples <= 0.0 {
        1.0
    } else {
        1.0 - (-1.0 / samples).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn one_time_constant_covers_most_of_the_way() {
        let mut s = Smoothed::new(0.0);
        s.set_target(1.0, 0.01, 1000.0);
        for _ in 0..10 {
            s.next_sample();
        }
        assert_abs_diff_eq!(s.current(), 1.0 - (-1.0f32).exp(), epsilon = 1e-4);
    }

    #[test]
    fn never_overshoots() {
        let mut s = Smoothed::new(1.0);
        s.set_target(0.0, 0.005, 48000.0);
        let mut last = s.current();
        for _ in 0..5000 {
            let v = s.next_sample();
            assert!(v <= last && v >= 0.0);
            last = v;
        }
    }

    #[test]
    fn sample_rate_change_keeps_time_constant() {
        let mut s = Smoothed::new(0.0);
        s.set_target(1.0, 0.01, 48000.0);
        s.set_sample_rate(1000.0);
        for _ in 0..10 {
            s.next_sample();
        }
        assert_abs_diff_eq!(s.current(), 1.0 - (-1.0f32).exp(), epsilon = 1e-4);
    }

    #[test]
    fn zero_time_constant_is_a_step() {
        let mut s = Smoothed::new(0.0);
        s.set_target(0.5, 0.0, 48000.0);
        assert_eq!(s.next_sample(), 0.5);
    }
}
