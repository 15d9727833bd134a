//! Rhythm prediction
//!
//! The predictor accumulates pulses into 4-beat phrases of 32 slots, commits
//! each finished phrase to a bounded history, and keeps three predictions of
//! the next phrase up to date:
//! - history-based (cycle detection, then frequency voting)
//! - fragment-based (voting over slots that were predicted correctly before)
//! - hyper (the fusion of both)
//!
//! Phrase lifecycle: no phrase → accumulating (first pulse) → commit and
//! restart once the phrase has run its 4 beats.

pub mod accuracy;
pub mod fusion;
pub mod pattern;
pub mod quantizer;
pub mod voting;

pub use accuracy::{calculate_prediction_accuracy, extract_correct_fragment, AccuracyRecord};
pub use fusion::fuse_predictions;
pub use pattern::{BoundedHistory, PhrasePattern, Prediction, SLOTS_PER_PHRASE};
pub use quantizer::Quantizer;

use crate::config::PredictorConfig;
use quantizer::is_valid_bpm;

/// Phrase currently being accumulated
#[derive(Debug, Clone, Copy)]
struct ActivePhrase {
    start: f64,
    pattern: PhrasePattern,
}

/// Outcome of a phrase rollover
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedPhrase {
    /// Anchor time of the finished phrase
    pub started_at: f64,
    pub pattern: PhrasePattern,
    /// Silent phrases are evaluated but never committed
    pub committed: bool,
    /// Hyper-prediction that was active while the phrase played
    pub prediction: Option<Prediction>,
    /// Score of `prediction`, when there was one
    pub accuracy: Option<AccuracyRecord>,
    /// Correct fragment archived for this phrase
    pub fragment: Option<PhrasePattern>,
}

/// Phrase accumulator plus history-, fragment- and hyper-predictors
pub struct RhythmPredictor {
    phrase: Option<ActivePhrase>,
    history: BoundedHistory<PhrasePattern>,
    fragments: BoundedHistory<PhrasePattern>,
    accuracy: BoundedHistory<AccuracyRecord>,
    history_prediction: Option<Prediction>,
    fragment_prediction: Option<Prediction>,
    hyper_prediction: Option<Prediction>,
    phrases_completed: u64,
}

impl RhythmPredictor {
    pub fn new(config: PredictorConfig) -> Self {
        Self {
            phrase: None,
            history: BoundedHistory::new(config.history_capacity),
            fragments: BoundedHistory::new(config.fragment_capacity),
            accuracy: BoundedHistory::new(config.accuracy_capacity),
            history_prediction: None,
            fragment_prediction: None,
            hyper_prediction: None,
            phrases_completed: 0,
        }
    }

    /// Register a pulse at `time` using the hyper-smoothed `bpm` for phrase timing
    ///
    /// Returns the finished phrase when this pulse rolled the phrase over.
    pub fn process_pulse(&mut self, time: f64, bpm: f64) -> Option<CompletedPhrase> {
        if !is_valid_bpm(bpm) {
            return None;
        }

        let mut completed = None;
        let current = self.phrase;
        let phrase = match current {
            Some(phrase) if Quantizer::new(phrase.start, bpm).has_elapsed(time) => {
                completed = Some(self.complete_phrase(phrase));
                self.start_phrase(time)
            }
            Some(phrase) => phrase,
            None => self.start_phrase(time),
        };

        let slot = Quantizer::new(phrase.start, bpm).quantize(time);
        if let Some(active) = self.phrase.as_mut() {
            active.pattern.set_active(slot);
        }
        tracing::debug!("[Predictor] Pulse at {:.3}s -> slot {}", time, slot);

        self.recompute();
        completed
    }

    /// Roll the phrase over once its full duration has passed without a pulse
    ///
    /// A non-silent phrase is committed and the next one is anchored at the
    /// boundary. A silent one is evaluated and the predictor waits for the
    /// next pulse to anchor a new phrase.
    pub fn advance(&mut self, time: f64, bpm: f64) -> Option<CompletedPhrase> {
        if !is_valid_bpm(bpm) {
            return None;
        }
        let phrase = self.phrase?;
        let quantizer = Quantizer::new(phrase.start, bpm);
        if !quantizer.has_elapsed(time) {
            return None;
        }

        let completed = self.complete_phrase(phrase);
        if completed.committed {
            self.start_phrase(quantizer.phrase_end());
        }
        Some(completed)
    }

    /// Attach a sustain length to the slot `time` falls on in the current phrase
    ///
    /// Only active slots take a duration; sustains that started before the
    /// current phrase are ignored.
    pub fn process_sustained_beat(&mut self, time: f64, duration_32nd: f64, bpm: f64) -> bool {
        if !is_valid_bpm(bpm) || !duration_32nd.is_finite() || duration_32nd <= 0.0 {
            return false;
        }
        let Some(phrase) = self.phrase.as_mut() else {
            return false;
        };
        let quantizer = Quantizer::new(phrase.start, bpm);
        if time < phrase.start || quantizer.has_elapsed(time) {
            return false;
        }

        let slot = quantizer.quantize(time);
        let attached = phrase.pattern.set_duration(slot, duration_32nd);
        if attached {
            tracing::debug!(
                "[Predictor] Sustain of {} 32nds on slot {}",
                duration_32nd,
                slot
            );
        }
        attached
    }

    fn start_phrase(&mut self, start: f64) -> ActivePhrase {
        let phrase = ActivePhrase {
            start,
            pattern: PhrasePattern::default(),
        };
        self.phrase = Some(phrase);
        phrase
    }

    fn complete_phrase(&mut self, phrase: ActivePhrase) -> CompletedPhrase {
        self.phrase = None;
        let pattern = phrase.pattern;
        let prediction = self.hyper_prediction;
        let committed = !pattern.is_silent();

        let mut accuracy = None;
        let mut fragment = None;
        if let Some(predicted) = prediction.as_ref() {
            let record = calculate_prediction_accuracy(&predicted.slots, &pattern.slots);
            self.accuracy.push(record);
            accuracy = Some(record);

            let extracted = extract_correct_fragment(predicted, &pattern);
            if !extracted.is_silent() {
                self.fragments.push(extracted);
                fragment = Some(extracted);
            }
        }

        if committed {
            self.history.push(pattern);
        }
        self.phrases_completed += 1;
        self.recompute();

        tracing::debug!(
            "[Predictor] Phrase {} complete: {} active, committed={}, accuracy={:?}",
            self.phrases_completed,
            pattern.active_count(),
            committed,
            accuracy.map(|r| r.accuracy)
        );

        CompletedPhrase {
            started_at: phrase.start,
            pattern,
            committed,
            prediction,
            accuracy,
            fragment,
        }
    }

    fn recompute(&mut self) {
        self.history_prediction = voting::predict_from_history(self.history.as_slice());
        self.fragment_prediction = voting::predict_from_fragments(self.fragments.as_slice());
        self.hyper_prediction = fuse_predictions(
            self.history_prediction.as_ref(),
            self.fragment_prediction.as_ref(),
        );
    }

    /// Pattern accumulated so far, or `None` when no phrase is active
    pub fn current_phrase(&self) -> Option<PhrasePattern> {
        self.phrase.map(|p| p.pattern)
    }

    pub fn phrase_start(&self) -> Option<f64> {
        self.phrase.map(|p| p.start)
    }

    pub fn history_prediction(&self) -> Option<Prediction> {
        self.history_prediction
    }

    pub fn fragment_prediction(&self) -> Option<Prediction> {
        self.fragment_prediction
    }

    pub fn hyper_prediction(&self) -> Option<Prediction> {
        self.hyper_prediction
    }

    pub fn phrase_history(&self) -> Vec<PhrasePattern> {
        self.history.to_vec()
    }

    pub fn correct_fragments(&self) -> Vec<PhrasePattern> {
        self.fragments.to_vec()
    }

    pub fn accuracy_history(&self) -> Vec<AccuracyRecord> {
        self.accuracy.to_vec()
    }

    /// Newest `n` committed phrases, oldest first
    pub fn recent_history(&self, n: usize) -> Vec<PhrasePattern> {
        self.history.last_n(n)
    }

    /// Newest `n` correct fragments, oldest first
    pub fn recent_fragments(&self, n: usize) -> Vec<PhrasePattern> {
        self.fragments.last_n(n)
    }

    /// Phrases rolled over so far, silent ones included
    pub fn phrases_completed(&self) -> u64 {
        self.phrases_completed
    }
}

impl Default for RhythmPredictor {
    fn default() -> Self {
        Self::new(PredictorConfig::default())
    }
}

#[cfg(test)]
#[path = "predictor_tests.rs"]
mod tests;
