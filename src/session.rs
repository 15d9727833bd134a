//! Detection session
//!
//! Owns one instance of every detection module and wires them together:
//! energy samples drive classification, sustain measurement, optional
//! threshold pulse detection and time-based phrase rollover; pulses drive the
//! tempo estimator and the rhythm predictor. Each session is independent, so
//! tests and tools can run several side by side.
//!
//! Callers deliver samples and pulses in non-decreasing time order.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::analysis::energy::{EnergyClassifier, EnergyLevel, LEVEL_COUNT};
use crate::analysis::level_crossing::LevelCrossingDetector;
use crate::analysis::sustain::{EnergySustainDetector, SustainDetector};
use crate::analysis::tempo::{TempoEstimate, TempoEstimator, TempoStats};
use crate::config::EngineConfig;
use crate::error::{log_config_error, log_remote_error, ConfigError, RemoteError};
use crate::prediction::{
    AccuracyRecord, CompletedPhrase, PhrasePattern, Prediction, RhythmPredictor,
};
use crate::remote::{RemotePayload, RemotePredictor, RECENT_PATTERNS};
use crate::telemetry::{DropReason, EngineEvent, TelemetryCollector};

/// Serializable view of a session for reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub tempo: Option<TempoEstimate>,
    pub tempo_stats: TempoStats,
    pub energy_level: u8,
    pub pulse_threshold: Option<f64>,
    pub pulse_count: u64,
    pub phrases_completed: u64,
    pub committed_phrases: usize,
    pub correct_fragments: usize,
    pub mean_accuracy: Option<f64>,
    pub current_phrase: Option<Vec<u8>>,
    pub history_prediction: Option<Vec<u8>>,
    pub fragment_prediction: Option<Vec<u8>>,
    pub hyper_prediction: Option<Vec<u8>>,
}

/// All detection state for one player
pub struct DetectionSession {
    config: EngineConfig,
    tempo: TempoEstimator,
    energy: EnergyClassifier,
    sustain: Box<dyn SustainDetector>,
    crossings: LevelCrossingDetector,
    predictor: RhythmPredictor,
    remote: Option<Box<dyn RemotePredictor>>,
    telemetry: Option<Arc<TelemetryCollector>>,
    pulses: u64,
}

impl DetectionSession {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            tempo: TempoEstimator::new(config.tempo.clone()),
            energy: EnergyClassifier::new(config.energy.clone()),
            sustain: Box::new(EnergySustainDetector::new()),
            crossings: LevelCrossingDetector::new(config.session.pulse_debounce_ms),
            predictor: RhythmPredictor::new(config.predictor.clone()),
            remote: None,
            telemetry: None,
            pulses: 0,
            config,
        }
    }

    /// Validate `config` before building the session
    pub fn try_new(config: EngineConfig) -> Result<Self, ConfigError> {
        if let Err(err) = config.validate() {
            log_config_error(&err, "DetectionSession::try_new");
            return Err(err);
        }
        Ok(Self::new(config))
    }

    pub fn with_remote(mut self, remote: Box<dyn RemotePredictor>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<TelemetryCollector>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn with_sustain_detector(mut self, detector: Box<dyn SustainDetector>) -> Self {
        self.sustain = detector;
        self
    }

    /// Feed one RMS sample (called at the energy sample rate)
    pub fn process_energy_sample(&mut self, time: f64, rms: f64) {
        self.energy.add_rms_sample(time, rms);
        let outcome = self.energy.update(time);
        if outcome.reclustered {
            if let Some(centers) = self.energy.cluster_centers() {
                self.publish(EngineEvent::Reclustered {
                    time,
                    centers: centers.to_vec(),
                });
            }
        }
        if let Some((from, to)) = outcome.level_change {
            self.publish(EngineEvent::EnergyLevelChanged { time, from, to });
        }

        if let (Some(bpm), Some(avg)) = (self.tempo.hyper_bpm(), self.energy.temporal_average()) {
            if let Some(beat) = self.sustain.process_diagnostic(time, avg, bpm) {
                self.predictor.process_sustained_beat(
                    beat.start_time,
                    f64::from(beat.duration_32nd),
                    bpm,
                );
            }
        }

        if self.config.session.auto_detect_pulses {
            if let Some(threshold) = self.energy.pulse_threshold() {
                if let Some(crossing) = self.crossings.process(rms, threshold, time) {
                    self.process_pulse(crossing.time);
                }
            }
        }

        if let Some(hint) = self.remote.as_mut().and_then(|r| r.poll_hint()) {
            self.set_server_bpm_hint(hint);
        }

        if let Some(bpm) = self.tempo.hyper_bpm() {
            if let Some(completed) = self.predictor.advance(time, bpm) {
                self.handle_completed(&completed, time);
            }
        }
    }

    /// Register a detected pulse
    ///
    /// The predictor only sees pulses once the tempo estimate is ready.
    pub fn process_pulse(&mut self, time: f64) {
        self.pulses += 1;
        let changes_before = self.tempo.stats().tempo_changes;
        self.tempo.add_beat(time);
        self.tempo.update();

        if self.tempo.stats().tempo_changes > changes_before {
            if let Some(bpm) = self.tempo.hyper_bpm() {
                tracing::info!("[Session] Tempo change to {:.1} BPM at {:.3}s", bpm, time);
                self.publish(EngineEvent::TempoChange { time, bpm });
            }
        }

        if let Some(bpm) = self.tempo.hyper_bpm() {
            if let Some(completed) = self.predictor.process_pulse(time, bpm) {
                self.handle_completed(&completed, time);
            }
        }

        let energy = self.energy.temporal_average().unwrap_or(0.0);
        self.sustain.process_pulse(time, energy);
    }

    pub fn set_server_bpm_hint(&mut self, bpm: f64) {
        self.tempo.set_server_bpm_hint(bpm);
    }

    /// Discard all accumulated state
    ///
    /// Every module is rebuilt from the session config. Remote and telemetry
    /// handles stay attached.
    pub fn reset(&mut self) {
        let remote = self.remote.take();
        let telemetry = self.telemetry.take();
        let mut sustain =
            std::mem::replace(&mut self.sustain, Box::new(EnergySustainDetector::new()));
        sustain.reset();

        *self = Self {
            remote,
            telemetry,
            sustain,
            ..Self::new(self.config.clone())
        };
        tracing::debug!("[Session] Reset");
    }

    fn handle_completed(&mut self, completed: &CompletedPhrase, time: f64) {
        if let Some(record) = completed.accuracy {
            self.publish(EngineEvent::PhraseEvaluated {
                started_at: completed.started_at,
                correct: record.correct,
                total: record.total,
                accuracy: record.accuracy,
                false_positives: record.false_positives,
            });
        }
        if !completed.committed {
            return;
        }
        self.publish(EngineEvent::PhraseCommitted {
            started_at: completed.started_at,
            active_slots: completed.pattern.active_count(),
        });

        if self.remote.is_none() {
            return;
        }
        let payload = self.remote_payload(time);
        let result = match self.remote.as_mut() {
            Some(remote) => remote.submit(payload),
            None => Ok(()),
        };
        if let Err(err) = result {
            log_remote_error(&err, "DetectionSession::submit");
            let reason = match err {
                RemoteError::Backpressure { .. } => DropReason::Backpressure,
                RemoteError::Disconnected => DropReason::Disconnected,
            };
            self.publish(EngineEvent::RemoteDropped { reason });
        }
    }

    /// Payload describing the current local state for the remote predictor
    pub fn remote_payload(&self, time: f64) -> RemotePayload {
        let recent = self.predictor.recent_history(RECENT_PATTERNS);
        RemotePayload {
            current_bpm: self.tempo.hyper_bpm(),
            bpm_history: self.tempo.bpm_history(),
            recent_pulse_patterns: recent.iter().map(PhrasePattern::to_bits).collect(),
            recent_pulse_durations_slots: recent.iter().map(duration_slots).collect(),
            recent_correct_prediction_parts: self
                .predictor
                .recent_fragments(RECENT_PATTERNS)
                .iter()
                .map(PhrasePattern::to_bits)
                .collect(),
            hyper_prediction: self.predictor.hyper_prediction().map(|p| p.to_bits()),
            timestamp: time * 1000.0,
        }
    }

    fn publish(&self, event: EngineEvent) {
        if let Some(telemetry) = &self.telemetry {
            telemetry.publish(event);
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn bpm(&self) -> Option<f64> {
        self.tempo.bpm()
    }

    pub fn hyper_bpm(&self) -> Option<f64> {
        self.tempo.hyper_bpm()
    }

    pub fn tempo_estimate(&self) -> Option<TempoEstimate> {
        self.tempo.estimate()
    }

    pub fn tempo_stats(&self) -> TempoStats {
        self.tempo.stats()
    }

    pub fn is_tempo_change_detected(&self) -> bool {
        self.tempo.is_tempo_change_detected()
    }

    pub fn bpm_history(&self) -> Vec<f64> {
        self.tempo.bpm_history()
    }

    pub fn current_energy_level(&self) -> u8 {
        self.energy.current_energy_level()
    }

    pub fn pulse_threshold(&self) -> Option<f64> {
        self.energy.pulse_threshold()
    }

    pub fn energy_levels(&self) -> Option<[EnergyLevel; LEVEL_COUNT]> {
        self.energy.levels()
    }

    pub fn current_phrase(&self) -> Option<PhrasePattern> {
        self.predictor.current_phrase()
    }

    pub fn history_prediction(&self) -> Option<Prediction> {
        self.predictor.history_prediction()
    }

    pub fn fragment_prediction(&self) -> Option<Prediction> {
        self.predictor.fragment_prediction()
    }

    pub fn hyper_prediction(&self) -> Option<Prediction> {
        self.predictor.hyper_prediction()
    }

    pub fn phrase_history(&self) -> Vec<PhrasePattern> {
        self.predictor.phrase_history()
    }

    pub fn correct_fragments(&self) -> Vec<PhrasePattern> {
        self.predictor.correct_fragments()
    }

    pub fn accuracy_history(&self) -> Vec<AccuracyRecord> {
        self.predictor.accuracy_history()
    }

    pub fn phrases_completed(&self) -> u64 {
        self.predictor.phrases_completed()
    }

    /// Pulses received since construction or the last reset
    pub fn pulse_count(&self) -> u64 {
        self.pulses
    }

    /// Mean of the retained accuracy records
    pub fn mean_accuracy(&self) -> Option<f64> {
        let records = self.predictor.accuracy_history();
        if records.is_empty() {
            return None;
        }
        Some(records.iter().map(|r| r.accuracy).sum::<f64>() / records.len() as f64)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            tempo: self.tempo.estimate(),
            tempo_stats: self.tempo.stats(),
            energy_level: self.energy.current_energy_level(),
            pulse_threshold: self.energy.pulse_threshold(),
            pulse_count: self.pulses,
            phrases_completed: self.predictor.phrases_completed(),
            committed_phrases: self.predictor.phrase_history().len(),
            correct_fragments: self.predictor.correct_fragments().len(),
            mean_accuracy: self.mean_accuracy(),
            current_phrase: self.predictor.current_phrase().map(|p| p.to_bits()),
            history_prediction: self.predictor.history_prediction().map(|p| p.to_bits()),
            fragment_prediction: self.predictor.fragment_prediction().map(|p| p.to_bits()),
            hyper_prediction: self.predictor.hyper_prediction().map(|p| p.to_bits()),
        }
    }
}

impl Default for DetectionSession {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// Per-slot sustain lengths rounded to whole 32nds, 0 where none
fn duration_slots(pattern: &PhrasePattern) -> Vec<u32> {
    pattern
        .durations
        .iter()
        .map(|d| d.map(|v| v.round().max(0.0) as u32).unwrap_or(0))
        .collect()
}
