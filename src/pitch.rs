//! Pitch model: key index to output frequency.
//!
//! Everything here is a pure function of its arguments. The output of a key is
//! built in three layers:
//!
//! ```text
//! equal temperament --(reality cents)--> reality --(detune cents)--> output
//! ```
//!
//! Reality cents come from the configured [`TuningMode`]: zero, a parametric
//! stretch curve, or an imported per-key curve.

use clap::ValueEnum;

use crate::curve::{CurvePayload, DetuneMap, DeviationCurve};
use crate::error::{Error, Result};
use crate::key::{KeyIndex, KEY_COUNT};

/// Where reality cents come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TuningMode {
    /// Plain 12-tone equal temperament.
    #[value(name = "et")]
    EqualTempered,
    /// Parametric stretch curve.
    #[default]
    Stretch,
    /// Equal temperament plus an imported per-key curve.
    Imported,
}

/// What a manually detuned key is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TuningTarget {
    #[default]
    #[value(name = "et")]
    EqualTempered,
    /// Whatever the current tuning mode produces.
    Reality,
}

/// Stretch curve parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StretchParams {
    /// Deviation of the lowest key, in cents.
    pub low_cents: f64,
    /// Deviation of the highest key, in cents.
    pub high_cents: f64,
    /// Exponent shaping how the deviation concentrates toward the ends.
    pub shape: f64,
}

impl Default for StretchParams {
    fn default() -> Self {
        StretchPreset::Medium.params()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum StretchPreset {
    Mild,
    #[default]
    Medium,
    Strong,
}

impl StretchPreset {
    pub fn params(self) -> StretchParams {
        let (low_cents, high_cents, shape) = match self {
            StretchPreset::Mild => (-10.0, 20.0, 1.5),
            StretchPreset::Medium => (-15.0, 35.0, 1.6),
            StretchPreset::Strong => (-25.0, 55.0, 1.8),
        };
        StretchParams {
            low_cents,
            high_cents,
            shape,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningConfig {
    /// Frequency of A4 in Hz.
    pub reference_hz: f64,
    pub mode: TuningMode,
    pub stretch: StretchParams,
    pub target: TuningTarget,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            reference_hz: 440.0,
            mode: TuningMode::default(),
            stretch: StretchParams::default(),
            target: TuningTarget::default(),
        }
    }
}

impl TuningConfig {
    /// Rejects configurations that would make every computed frequency non-finite.
    pub fn validate(&self) -> Result<()> {
        if !self.reference_hz.is_finite() || self.reference_hz <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "reference pitch must be a positive number of Hz, got {}",
                self.reference_hz
            )));
        }
        let StretchParams {
            low_cents,
            high_cents,
            shape,
        } = self.stretch;
        if !shape.is_finite() || shape <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "stretch shape must be positive, got {shape}"
            )));
        }
        if !low_cents.is_finite() || !high_cents.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "stretch extremes must be finite, got {low_cents} / {high_cents}"
            )));
        }
        Ok(())
    }
}

/// Every intermediate value of a pitch computation, for display and playback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchReading {
    pub equal_tempered_hz: f64,
    pub reality_cents: f64,
    pub reality_hz: f64,
    pub detune_cents: f64,
    pub output_hz: f64,
}

#[inline]
pub fn cents_to_ratio(cents: f64) -> f64 {
    2f64.powf(cents / 1200.0)
}

pub fn equal_tempered_hz(reference_hz: f64, key: KeyIndex) -> f64 {
    let semitones = key.index() as f64 - KeyIndex::REFERENCE.index() as f64;
    reference_hz * 2f64.powf(semitones / 12.0)
}

/// Deviation of a key on the stretch curve.
///
/// The key's index is mapped to `x` in `[-1, 1]` with the midpoint of the
/// keyboard at zero; the deviation is `|x|^shape` scaled by the low extreme
/// for the bass half and the high extreme for the treble half.
pub fn stretch_cents(key: KeyIndex, params: &StretchParams) -> f64 {
    let t = key.index() as f64 / (KEY_COUNT - 1) as f64;
    let x = (t - 0.5) * 2.0;
    let magnitude = x.abs().powf(params.shape);
    if x < 0.0 {
        magnitude * params.low_cents
    } else {
        magnitude * params.high_cents
    }
}

/// Reality cents of a key under the configured mode. Does not validate.
fn reality_cents(config: &TuningConfig, curve: Option<&DeviationCurve>, key: KeyIndex) -> f64 {
    match config.mode {
        TuningMode::EqualTempered => 0.0,
        TuningMode::Stretch => stretch_cents(key, &config.stretch),
        TuningMode::Imported => curve.map_or(0.0, |curve| curve.cents(key)),
    }
}

pub fn compute_output(
    config: &TuningConfig,
    curve: Option<&DeviationCurve>,
    detune: &DetuneMap,
    key: KeyIndex,
) -> Result<PitchReading> {
    config.validate()?;

    let equal_tempered_hz = equal_tempered_hz(config.reference_hz, key);
    let reality_cents = reality_cents(config, curve, key);
    let reality_hz = equal_tempered_hz * cents_to_ratio(reality_cents);
    let detune_cents = detune.get(key);
    let output_hz = reality_hz * cents_to_ratio(detune_cents);

    Ok(PitchReading {
        equal_tempered_hz,
        reality_cents,
        reality_hz,
        detune_cents,
        output_hz,
    })
}

/// Cents the key should sit at relative to equal temperament, per the configured target.
pub fn target_cents(
    config: &TuningConfig,
    curve: Option<&DeviationCurve>,
    key: KeyIndex,
) -> Result<f64> {
    config.validate()?;
    Ok(match config.target {
        TuningTarget::EqualTempered => 0.0,
        TuningTarget::Reality => reality_cents(config, curve, key),
    })
}

/// Materializes the reality curve of all 88 keys under the current mode.
pub fn export_curve(config: &TuningConfig, curve: Option<&DeviationCurve>) -> Result<CurvePayload> {
    config.validate()?;
    Ok(CurvePayload {
        reference_hz: config.reference_hz,
        cents: KeyIndex::all()
            .map(|key| reality_cents(config, curve, key))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn stretch(low: f64, high: f64, shape: f64) -> TuningConfig {
        TuningConfig {
            stretch: StretchParams {
                low_cents: low,
                high_cents: high,
                shape,
            },
            ..TuningConfig::default()
        }
    }

    #[test]
    fn equal_temperament_has_no_reality_offset() {
        let config = TuningConfig {
            mode: TuningMode::EqualTempered,
            ..TuningConfig::default()
        };
        let mut detune = DetuneMap::default();
        detune.set(KeyIndex::new(10).unwrap(), 12.5);

        for key in KeyIndex::all() {
            let reading = compute_output(&config, None, &detune, key).unwrap();
            assert_eq!(reading.reality_cents, 0.0);
            assert_relative_eq!(
                reading.output_hz,
                reading.equal_tempered_hz * cents_to_ratio(detune.get(key)),
                max_relative = 1e-12
            );
        }
    }

    #[test]
    fn a4_is_the_reference_pitch() {
        let config = TuningConfig {
            mode: TuningMode::EqualTempered,
            ..TuningConfig::default()
        };
        let reading =
            compute_output(&config, None, &DetuneMap::default(), KeyIndex::REFERENCE).unwrap();
        assert_relative_eq!(reading.output_hz, 440.0);
        let a0 = compute_output(&config, None, &DetuneMap::default(), KeyIndex::LOWEST).unwrap();
        assert_relative_eq!(a0.output_hz, 27.5, max_relative = 1e-12);
    }

    #[test]
    fn stretch_extremes() {
        let config = stretch(-20.0, 40.0, 1.5);
        assert_relative_eq!(stretch_cents(KeyIndex::LOWEST, &config.stretch), -20.0);
        assert_relative_eq!(stretch_cents(KeyIndex::HIGHEST, &config.stretch), 40.0);
    }

    #[test]
    fn stretch_is_odd_symmetric_with_mirrored_extremes() {
        for shape in [0.5, 1.0, 1.6, 3.0] {
            let params = stretch(-30.0, 30.0, shape).stretch;
            for key in KeyIndex::all() {
                assert_relative_eq!(
                    stretch_cents(key, &params),
                    -stretch_cents(key.mirrored(), &params),
                    epsilon = 1e-9
                );
            }
        }
    }

    #[test]
    fn stretch_is_flat_in_the_middle() {
        for shape in [1.0, 1.5, 2.5] {
            let params = stretch(-25.0, 55.0, shape).stretch;
            for index in [43, 44] {
                assert!(stretch_cents(KeyIndex::new(index).unwrap(), &params).abs() < 1.0);
            }
        }
    }

    #[test]
    fn stretch_is_monotonic() {
        let params = StretchPreset::Strong.params();
        let curve: Vec<f64> = KeyIndex::all().map(|k| stretch_cents(k, &params)).collect();
        assert!(curve.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn imported_mode_without_curve_is_equal_tempered() {
        let config = TuningConfig {
            mode: TuningMode::Imported,
            ..TuningConfig::default()
        };
        let reading = compute_output(&config, None, &DetuneMap::default(), KeyIndex::LOWEST).unwrap();
        assert_eq!(reading.reality_cents, 0.0);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let detune = DetuneMap::default();
        for reference_hz in [0.0, -440.0, f64::NAN, f64::INFINITY] {
            let config = TuningConfig {
                reference_hz,
                ..TuningConfig::default()
            };
            assert!(matches!(
                compute_output(&config, None, &detune, KeyIndex::REFERENCE),
                Err(Error::InvalidConfig(_))
            ));
        }
        for shape in [0.0, -1.0, f64::NAN] {
            let config = stretch(-10.0, 10.0, shape);
            assert!(compute_output(&config, None, &detune, KeyIndex::REFERENCE).is_err());
            assert!(export_curve(&config, None).is_err());
        }
    }

    #[test]
    fn target_follows_configured_target() {
        let mut config = stretch(-20.0, 40.0, 1.0);
        assert_eq!(target_cents(&config, None, KeyIndex::LOWEST).unwrap(), 0.0);
        config.target = TuningTarget::Reality;
        assert_relative_eq!(target_cents(&config, None, KeyIndex::LOWEST).unwrap(), -20.0);
    }

    #[test]
    fn export_covers_every_key() {
        let config = stretch(-20.0, 40.0, 1.5);
        let payload = export_curve(&config, None).unwrap();
        assert_eq!(payload.cents.len(), KEY_COUNT);
        assert_eq!(payload.reference_hz, 440.0);
        assert_relative_eq!(payload.cents[87], 40.0);

        let et = TuningConfig {
            mode: TuningMode::EqualTempered,
            ..config
        };
        assert!(export_curve(&et, None).unwrap().cents.iter().all(|c| *c == 0.0));
    }
}
