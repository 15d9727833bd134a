//! Session-level tests driving the full pipeline through its public API
//!
//! These cover the observable contract of a detection session:
//! - "not ready" sentinels on fresh construction and after reset
//! - tempo warm-up before phrases start
//! - phrase commits, silence handling and prediction of a steady pattern
//! - energy classification riding alongside pulse input

use std::sync::Arc;

use rhythm_engine::analysis::energy::UNKNOWN_LEVEL;
use rhythm_engine::fixtures::{replay, SyntheticSpec};
use rhythm_engine::remote;
use rhythm_engine::telemetry::{EngineEvent, TelemetryCollector};
use rhythm_engine::{DetectionSession, EngineConfig};

const BEAT_SECS: f64 = 0.5;

/// Helper: `count` quarter-note pulses at 120 BPM starting at `start`
fn pulse_quarters(session: &mut DetectionSession, start: f64, count: usize) -> f64 {
    for k in 0..count {
        session.process_pulse(start + k as f64 * BEAT_SECS);
    }
    start + count as f64 * BEAT_SECS
}

fn assert_no_data(session: &DetectionSession) {
    assert_eq!(session.bpm(), None);
    assert_eq!(session.hyper_bpm(), None);
    assert!(!session.is_tempo_change_detected());
    assert!(session.bpm_history().is_empty());
    assert_eq!(session.current_energy_level(), UNKNOWN_LEVEL);
    assert_eq!(session.pulse_threshold(), None);
    assert!(session.energy_levels().is_none());
    assert!(session.current_phrase().is_none());
    assert!(session.history_prediction().is_none());
    assert!(session.fragment_prediction().is_none());
    assert!(session.hyper_prediction().is_none());
    assert!(session.phrase_history().is_empty());
    assert!(session.correct_fragments().is_empty());
    assert!(session.accuracy_history().is_empty());
    assert_eq!(session.phrases_completed(), 0);
}

#[test]
fn test_fresh_and_reset_sessions_report_no_data() {
    let mut session = DetectionSession::default();
    assert_no_data(&session);

    let end = pulse_quarters(&mut session, 0.0, 24);
    for i in 0..200 {
        session.process_energy_sample(end + i as f64 * 0.01, 0.05 + (i % 10) as f64 * 0.05);
    }
    assert!(session.hyper_prediction().is_some());
    assert_ne!(session.current_energy_level(), UNKNOWN_LEVEL);

    // Mid-phrase reset
    session.reset();
    assert_no_data(&session);
}

#[test]
fn test_steady_phrases_are_predicted_before_fifth_completes() {
    let mut session = DetectionSession::default();
    // Tempo becomes ready on the fourth pulse, anchoring the first phrase there
    let warmup_end = pulse_quarters(&mut session, 0.0, 3);
    assert!(session.current_phrase().is_none());

    // Four full phrases of {0, 8, 16, 24}, then the downbeat of the fifth
    let fifth = pulse_quarters(&mut session, warmup_end, 16);
    session.process_pulse(fifth);

    assert_eq!(session.phrase_history().len(), 4);
    let hyper = session.hyper_prediction().expect("hyper prediction");
    for slot in [0, 8, 16, 24] {
        assert!(hyper.is_active(slot), "slot {slot} should be predicted");
    }
    assert_eq!(session.current_phrase().unwrap().active_slots(), vec![0]);
}

#[test]
fn test_silent_phrase_never_enters_history() {
    let telemetry = Arc::new(TelemetryCollector::new(64, 64));
    let mut session = DetectionSession::default().with_telemetry(Arc::clone(&telemetry));
    let end = pulse_quarters(&mut session, 0.0, 8);
    let committed_before = session.phrase_history().len();

    // Two phrases of energy with no pulses at all
    for i in 0..400 {
        session.process_energy_sample(end + i as f64 * 0.01, 0.01);
    }

    let history = session.phrase_history();
    assert!(history.iter().all(|p| !p.is_silent()));
    assert_eq!(history.len(), committed_before + 1);
    assert!(session.current_phrase().is_none());

    let last = session.accuracy_history().last().copied().expect("silent phrase scored");
    assert_eq!(last.total, 0);
    assert_eq!(last.accuracy, 0.0);
    assert!(
        telemetry.count_matching(|e| matches!(e, EngineEvent::PhraseEvaluated { total: 0, .. }))
            >= 1
    );
}

#[test]
fn test_alternating_patterns_detect_cycle() {
    let trace = SyntheticSpec {
        phrases: 9,
        active_slots: vec![0, 8, 16, 24],
        alternate_slots: Some(vec![0, 4, 16, 20]),
        ..SyntheticSpec::default()
    }
    .generate("alternating")
    .unwrap();

    let report = replay(&trace, EngineConfig::default()).unwrap();
    assert!(report.session.committed_phrases >= 4);
    // Later phrases follow the detected two-phrase cycle
    let late: Vec<f64> = report.accuracy.iter().rev().take(2).map(|r| r.accuracy).collect();
    assert!(late.iter().all(|&a| a >= 0.75), "late accuracy {late:?}");
}

#[test]
fn test_energy_classification_alongside_pulses() {
    let mut session = DetectionSession::default();
    for i in 0..49 {
        session.process_energy_sample(i as f64 * 0.01, 0.2);
    }
    assert_eq!(session.current_energy_level(), UNKNOWN_LEVEL);

    for i in 49..300 {
        let rms = [0.05, 0.1, 0.2, 0.4, 0.8][i % 5];
        session.process_energy_sample(i as f64 * 0.01, rms);
    }
    let levels = session.energy_levels().expect("levels after clustering");
    assert!(levels.windows(2).all(|w| w[0].center <= w[1].center));
    assert_eq!(session.pulse_threshold(), Some(levels[2].center));
}

#[test]
fn test_full_remote_queue_keeps_local_prediction() {
    let (remote, _endpoint) = remote::channel(1);
    let mut session = DetectionSession::default().with_remote(Box::new(remote));
    let mut local = DetectionSession::default();
    pulse_quarters(&mut session, 0.0, 40);
    pulse_quarters(&mut local, 0.0, 40);

    assert_eq!(session.phrase_history(), local.phrase_history());
    assert_eq!(session.accuracy_history(), local.accuracy_history());
}
