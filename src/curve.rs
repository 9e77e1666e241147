//! Per-key cents data: imported deviation curves, manual detune, and the
//! JSON payload used to move curves in and out.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ImportError;
use crate::key::{KeyIndex, KEY_COUNT};

/// A measured or imported deviation from equal temperament, one value per key.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviationCurve([f64; KEY_COUNT]);

impl DeviationCurve {
    pub fn from_cents(cents: &[f64]) -> Result<Self, ImportError> {
        if cents.len() != KEY_COUNT {
            return Err(ImportError::WrongLength(cents.len()));
        }
        if let Some(index) = cents.iter().position(|c| !c.is_finite()) {
            return Err(ImportError::NonNumeric { index });
        }
        let mut values = [0.0; KEY_COUNT];
        values.copy_from_slice(cents);
        Ok(Self(values))
    }

    pub fn cents(&self, key: KeyIndex) -> f64 {
        self.0[key.index()]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Manual per-key offsets in cents. Keys without an entry are not detuned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetuneMap(HashMap<KeyIndex, f64>);

impl DetuneMap {
    pub fn get(&self, key: KeyIndex) -> f64 {
        self.0.get(&key).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, key: KeyIndex, cents: f64) {
        self.0.insert(key, cents);
    }

    /// Adds `step` cents to the key's current offset and returns the new value.
    pub fn nudge(&mut self, key: KeyIndex, step: f64) -> f64 {
        let cents = self.0.entry(key).or_insert(0.0);
        *cents += step;
        *cents
    }

    pub fn remove(&mut self, key: KeyIndex) {
        self.0.remove(&key);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Transportable snapshot of a reality curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurvePayload {
    pub reference_hz: f64,
    pub cents: Vec<f64>,
}

/// Result of parsing an import payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveImport {
    /// Reference pitch carried by the payload, if it had one.
    pub reference_hz: Option<f64>,
    pub curve: DeviationCurve,
}

#[derive(Deserialize)]
struct RawPayload {
    #[serde(default, rename = "referenceHz", alias = "a4Hz")]
    reference_hz: Option<Value>,
    #[serde(default, alias = "curveCents88")]
    cents: Option<Value>,
}

impl CurvePayload {
    pub fn to_json(&self) -> Result<String, ImportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses and validates an import payload.
    ///
    /// Entries of `cents` may be numbers or strings starting with a number. A wrong length or
    /// any entry that does not coerce to a finite number rejects the payload.
    /// A non-numeric `referenceHz` is ignored.
    pub fn parse(json: &str) -> Result<CurveImport, ImportError> {
        let raw: RawPayload = serde_json::from_str(json)?;

        let entries = match raw.cents {
            Some(Value::Array(entries)) => entries,
            _ => return Err(ImportError::NotAnArray),
        };
        if entries.len() != KEY_COUNT {
            return Err(ImportError::WrongLength(entries.len()));
        }
        let cents = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| coerce(entry).ok_or(ImportError::NonNumeric { index }))
            .collect::<Result<Vec<_>, _>>()?;
        let curve = DeviationCurve::from_cents(&cents)?;

        let reference_hz = match raw.reference_hz.as_ref().and_then(Value::as_f64) {
            Some(hz) if !hz.is_finite() || hz <= 0.0 => {
                return Err(ImportError::InvalidReference(hz))
            }
            other => other,
        };

        Ok(CurveImport {
            reference_hz,
            curve,
        })
    }
}

fn coerce(entry: &Value) -> Option<f64> {
    let value = match entry {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => parse_float_prefix(s)?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

/// Reads the longest leading number of `s`, ignoring leading whitespace and
/// whatever follows the number (`"2.5c"` reads as 2.5).
fn parse_float_prefix(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let candidate_len = s
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')))
        .unwrap_or(s.len());
    (1..=candidate_len)
        .rev()
        .find_map(|len| s[..len].parse::<f64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zeros_json(reference: &str) -> String {
        let cents = vec!["0"; KEY_COUNT].join(",");
        format!(r#"{{"referenceHz": {reference}, "cents": [{cents}]}}"#)
    }

    #[test]
    fn parses_payload() {
        let import = CurvePayload::parse(&zeros_json("442")).unwrap();
        assert_eq!(import.reference_hz, Some(442.0));
        assert!(import.curve.as_slice().iter().all(|c| *c == 0.0));
    }

    #[test]
    fn accepts_legacy_keys_and_numeric_strings() {
        let mut cents: Vec<String> = (0..KEY_COUNT).map(|i| i.to_string()).collect();
        cents[5] = "\" 2.5 \"".to_string();
        let json = format!(r#"{{"a4Hz": 441.5, "curveCents88": [{}]}}"#, cents.join(","));

        let import = CurvePayload::parse(&json).unwrap();
        assert_eq!(import.reference_hz, Some(441.5));
        assert_eq!(import.curve.cents(KeyIndex::new(5).unwrap()), 2.5);
        assert_eq!(import.curve.cents(KeyIndex::HIGHEST), 87.0);
    }

    #[test]
    fn strings_coerce_by_leading_number() {
        assert_eq!(parse_float_prefix("2.5c"), Some(2.5));
        assert_eq!(parse_float_prefix("  -12 cents"), Some(-12.0));
        assert_eq!(parse_float_prefix("1e3x"), Some(1000.0));
        assert_eq!(parse_float_prefix("3e"), Some(3.0));
        assert_eq!(parse_float_prefix("c2.5"), None);
        assert_eq!(parse_float_prefix("-"), None);
        assert_eq!(parse_float_prefix(""), None);

        let mut cents = vec!["0".to_string(); KEY_COUNT];
        cents[7] = "\"2.5c\"".to_string();
        let json = format!(r#"{{"cents": [{}]}}"#, cents.join(","));
        let import = CurvePayload::parse(&json).unwrap();
        assert_eq!(import.curve.cents(KeyIndex::new(7).unwrap()), 2.5);

        cents[7] = "\"c2.5\"".to_string();
        let json = format!(r#"{{"cents": [{}]}}"#, cents.join(","));
        assert!(matches!(
            CurvePayload::parse(&json),
            Err(ImportError::NonNumeric { index: 7 })
        ));
    }

    #[test]
    fn non_numeric_reference_is_ignored() {
        let import = CurvePayload::parse(&zeros_json("\"fast\"")).unwrap();
        assert_eq!(import.reference_hz, None);
    }

    #[test]
    fn rejects_bad_payloads() {
        assert!(matches!(
            CurvePayload::parse(r#"{"referenceHz": 440, "cents": [1, 2, 3]}"#),
            Err(ImportError::WrongLength(3))
        ));
        assert!(matches!(
            CurvePayload::parse(r#"{"referenceHz": 440}"#),
            Err(ImportError::NotAnArray)
        ));
        assert!(matches!(
            CurvePayload::parse("{not json"),
            Err(ImportError::Json(_))
        ));
        assert!(matches!(
            CurvePayload::parse(&zeros_json("-1")),
            Err(ImportError::InvalidReference(_))
        ));

        let mut cents = vec!["0".to_string(); KEY_COUNT];
        cents[40] = "\"sharp\"".to_string();
        let json = format!(r#"{{"cents": [{}]}}"#, cents.join(","));
        assert!(matches!(
            CurvePayload::parse(&json),
            Err(ImportError::NonNumeric { index: 40 })
        ));

        cents[40] = "null".to_string();
        let json = format!(r#"{{"cents": [{}]}}"#, cents.join(","));
        assert!(CurvePayload::parse(&json).is_err());
    }

    #[test]
    fn export_uses_camel_case() {
        let payload = CurvePayload {
            reference_hz: 440.0,
            cents: vec![0.0; 2],
        };
        let json = payload.to_json().unwrap();
        assert!(json.contains("\"referenceHz\": 440.0"));
        assert!(json.contains("\"cents\""));
    }

    #[test]
    fn detune_defaults_to_zero() {
        let mut detune = DetuneMap::default();
        let key = KeyIndex::REFERENCE;
        assert_eq!(detune.get(key), 0.0);
        assert_eq!(detune.nudge(key, 1.5), 1.5);
        assert_eq!(detune.nudge(key, -0.5), 1.0);
        detune.remove(key);
        assert!(detune.is_empty());
    }
}
