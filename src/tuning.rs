//! The session's tuning state and the gestures that edit it.

use rand::Rng;
use tracing::{debug, info};

use crate::curve::{CurvePayload, DetuneMap, DeviationCurve};
use crate::error::Result;
use crate::key::KeyIndex;
use crate::pitch::{self, PitchReading, TuningConfig};

/// Largest magnitude of a random detune, in cents.
pub const RANDOM_DETUNE_RANGE: f64 = 35.0;

/// Tuning configuration, imported curve and manual detune, read together by
/// every pitch query.
#[derive(Debug, Clone, Default)]
pub struct Tuning {
    pub config: TuningConfig,
    pub curve: Option<DeviationCurve>,
    pub detune: DetuneMap,
}

impl Tuning {
    pub fn new(config: TuningConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn reading(&self, key: KeyIndex) -> Result<PitchReading> {
        pitch::compute_output(&self.config, self.curve.as_ref(), &self.detune, key)
    }

    pub fn output_hz(&self, key: KeyIndex) -> Result<f64> {
        Ok(self.reading(key)?.output_hz)
    }

    pub fn target_cents(&self, key: KeyIndex) -> Result<f64> {
        pitch::target_cents(&self.config, self.curve.as_ref(), key)
    }

    pub fn export(&self) -> Result<CurvePayload> {
        pitch::export_curve(&self.config, self.curve.as_ref())
    }

    /// Replaces the imported curve (and reference pitch, when the payload has
    /// one) from a JSON payload. On error nothing changes.
    pub fn import_json(&mut self, json: &str) -> Result<()> {
        let import = CurvePayload::parse(json)?;
        if let Some(reference_hz) = import.reference_hz {
            self.config.reference_hz = reference_hz;
        }
        self.curve = Some(import.curve);
        info!(reference_hz = self.config.reference_hz, "imported deviation curve");
        Ok(())
    }

    pub fn clear_curve(&mut self) {
        self.curve = None;
    }

    pub fn set_detune(&mut self, key: KeyIndex, cents: f64) {
        self.detune.set(key, cents);
    }

    pub fn nudge_detune(&mut self, key: KeyIndex, step: f64) -> f64 {
        self.detune.nudge(key, step)
    }

    /// Detunes a key by a random amount, for ear-training.
    pub fn randomize_detune<R: Rng + ?Sized>(&mut self, key: KeyIndex, rng: &mut R) -> f64 {
        let cents = round_tenth(rng.gen_range(-RANDOM_DETUNE_RANGE..RANDOM_DETUNE_RANGE));
        debug!(%key, cents, "random detune");
        self.detune.set(key, cents);
        cents
    }

    /// Sets the key's detune so its output lands on the target curve.
    pub fn snap_to_target(&mut self, key: KeyIndex) -> Result<f64> {
        let reality = self.reading(key)?.reality_cents;
        let target = self.target_cents(key)?;
        let cents = round_tenth(target - reality);
        self.detune.set(key, cents);
        Ok(cents)
    }

    pub fn reset_detune(&mut self) {
        self.detune.clear();
    }
}

fn round_tenth(cents: f64) -> f64 {
    (cents * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KEY_COUNT;
    use crate::pitch::{StretchParams, TuningMode, TuningTarget};
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn stretched() -> Tuning {
        Tuning::new(TuningConfig {
            stretch: StretchParams {
                low_cents: -20.0,
                high_cents: 40.0,
                shape: 1.5,
            },
            ..TuningConfig::default()
        })
    }

    #[test]
    fn export_then_import_reproduces_output() {
        let mut tuning = stretched();
        tuning.set_detune(KeyIndex::new(3).unwrap(), 7.0);
        let before: Vec<f64> = KeyIndex::all()
            .map(|k| tuning.output_hz(k).unwrap())
            .collect();

        let json = tuning.export().unwrap().to_json().unwrap();
        tuning.import_json(&json).unwrap();
        tuning.config.mode = TuningMode::Imported;

        for (key, expected) in KeyIndex::all().zip(before) {
            assert_relative_eq!(tuning.output_hz(key).unwrap(), expected, max_relative = 1e-12);
        }
    }

    #[test]
    fn failed_import_changes_nothing() {
        let mut tuning = stretched();
        let before = tuning.config;
        assert!(tuning
            .import_json(r#"{"referenceHz": 415, "cents": [0]}"#)
            .is_err());
        assert_eq!(tuning.config, before);
        assert!(tuning.curve.is_none());
    }

    #[test]
    fn zero_curve_at_442_is_equal_temperament() {
        let mut tuning = stretched();
        let json = format!(
            r#"{{"referenceHz": 442, "cents": [{}]}}"#,
            vec!["0"; KEY_COUNT].join(",")
        );
        tuning.import_json(&json).unwrap();
        tuning.config.mode = TuningMode::Imported;

        for key in KeyIndex::all() {
            let semitones = key.index() as f64 - 48.0;
            let expected = 442.0 * 2f64.powf(semitones / 12.0);
            assert_relative_eq!(tuning.output_hz(key).unwrap(), expected, max_relative = 1e-12);
        }
    }

    #[test]
    fn snap_cancels_reality_for_equal_temperament_target() {
        let mut tuning = stretched();
        let key = KeyIndex::HIGHEST;
        let cents = tuning.snap_to_target(key).unwrap();
        assert_relative_eq!(cents, -40.0);
        let reading = tuning.reading(key).unwrap();
        assert_relative_eq!(reading.output_hz, reading.equal_tempered_hz, max_relative = 1e-12);

        tuning.config.target = TuningTarget::Reality;
        assert_eq!(tuning.snap_to_target(key).unwrap(), 0.0);
    }

    #[test]
    fn random_detune_stays_in_range() {
        let mut tuning = Tuning::default();
        let mut rng = StdRng::seed_from_u64(7);
        for key in KeyIndex::all() {
            let cents = tuning.randomize_detune(key, &mut rng);
            assert!(cents.abs() <= RANDOM_DETUNE_RANGE);
            assert_eq!(tuning.detune.get(key), cents);
            assert_relative_eq!(cents * 10.0, (cents * 10.0).round(), epsilon = 1e-9);
        }
        tuning.reset_detune();
        assert!(tuning.detune.is_empty());
    }
}
