use std::time::Duration;

use approx::assert_relative_eq;
use tuning_playground::capture::{PlaybackSession, Selection, StartOutcome};
use tuning_playground::curve::DetuneMap;
use tuning_playground::key::KEY_COUNT;
use tuning_playground::pitch::{self, stretch_cents, StretchParams};
use tuning_playground::state::Instrument;
use tuning_playground::{
    KeyIndex, ReleaseMode, Tuning, TuningConfig, TuningMode, VoicePool,
};

fn key(index: usize) -> KeyIndex {
    KeyIndex::new(index).unwrap()
}

#[test]
fn stretch_extremes_at_reference_440() {
    let params = StretchParams {
        low_cents: -20.0,
        high_cents: 40.0,
        shape: 1.5,
    };
    assert_relative_eq!(stretch_cents(KeyIndex::LOWEST, &params), -20.0);
    assert_relative_eq!(stretch_cents(KeyIndex::HIGHEST, &params), 40.0);

    let config = TuningConfig {
        reference_hz: 440.0,
        mode: TuningMode::Stretch,
        stretch: params,
        ..TuningConfig::default()
    };
    let top = pitch::compute_output(&config, None, &DetuneMap::default(), KeyIndex::HIGHEST).unwrap();
    assert_relative_eq!(top.reality_cents, 40.0);
    assert_relative_eq!(
        top.output_hz,
        top.equal_tempered_hz * 2f64.powf(40.0 / 1200.0),
        max_relative = 1e-12
    );
}

#[test]
fn out_of_range_key_is_rejected() {
    assert!(KeyIndex::new(KEY_COUNT).is_err());
    assert!(KeyIndex::new(200).is_err());
    assert!(KeyIndex::from_midi(0).is_err());
}

#[test]
fn every_mode_survives_an_export_import_round_trip() {
    for mode in [TuningMode::EqualTempered, TuningMode::Stretch] {
        let mut tuning = Tuning::new(TuningConfig {
            reference_hz: 435.0,
            mode,
            ..TuningConfig::default()
        });
        tuning.set_detune(key(70), -3.3);
        let expected: Vec<f64> = KeyIndex::all().map(|k| tuning.output_hz(k).unwrap()).collect();

        let json = tuning.export().unwrap().to_json().unwrap();
        let mut restored = Tuning::default();
        restored.detune = tuning.detune.clone();
        restored.import_json(&json).unwrap();
        restored.config.mode = TuningMode::Imported;

        for (k, hz) in KeyIndex::all().zip(expected) {
            assert_relative_eq!(restored.output_hz(k).unwrap(), hz, max_relative = 1e-12);
        }
    }
}

#[test]
fn polyphony_four_evicts_the_first_key() {
    let tuning = Tuning::default();
    let mut pool = VoicePool::new(4, 48000.0);
    for (t, k) in [10, 20, 30, 40, 50].into_iter().enumerate() {
        pool.press(key(k), Duration::from_millis(t as u64), &tuning).unwrap();
    }
    let active: Vec<usize> = pool.active_keys().map(KeyIndex::index).collect();
    assert_eq!(active, [20, 30, 40, 50]);
}

#[test]
fn hard_release_is_immediate() {
    let tuning = Tuning::default();
    let mut pool = VoicePool::default();
    pool.press(key(44), Duration::ZERO, &tuning).unwrap();
    pool.release(key(44), ReleaseMode::Hard);
    assert!(!pool.is_active(key(44)));

    let mut out = [1.0f32; 64];
    pool.render(&mut out);
    assert!(out.iter().all(|s| *s == 0.0));
}

#[test]
fn capture_sweeps_the_keyboard() {
    let mut instrument = Instrument::new(
        Tuning::default(),
        VoicePool::default(),
        PlaybackSession::new(Duration::from_millis(200), Duration::from_millis(100)),
    );
    let selection = Selection::Interval {
        start: KeyIndex::LOWEST,
        step: 12,
    };
    let outcome = instrument.start_capture_at(&selection, Duration::ZERO).unwrap();
    assert_eq!(outcome, StartOutcome::Started { len: 8 });

    let mut heard = Vec::new();
    let mut now = Duration::ZERO;
    while instrument.capture.is_running() {
        heard.extend(instrument.pool.active_keys().map(|k| k.to_string()));
        assert!(instrument.pool.active_count() <= 1);
        now += Duration::from_millis(10);
        instrument.tick_at(now);
    }
    heard.dedup();
    assert_eq!(heard, ["A0", "A1", "A2", "A3", "A4", "A5", "A6", "A7"]);
    assert_eq!(now, Duration::from_millis(8 * 300));
}
