//! Tempo estimation from raw pulse timestamps
//!
//! Raw onsets are turned into inter-beat intervals, screened for plausibility
//! and consistency, and folded into two exponential averages:
//! - fast: follows the player quickly, used for display
//! - hyper: slow and stable, used for every phrase-boundary calculation
//!
//! Accessors return `None` until enough intervals were accepted. Callers treat
//! that as "not ready", never as an error.

use std::collections::VecDeque;

use crate::config::TempoConfig;

/// Raw onsets retained for interval computation
const BEAT_CAPACITY: usize = 32;

/// Accepted BPM values retained for the remote payload
pub const BPM_HISTORY_CAPACITY: usize = 10;

/// Counters describing how the estimator treated incoming intervals
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TempoStats {
    pub accepted: u64,
    pub dropped: u64,
    pub halved: u64,
    pub tempo_changes: u64,
}

/// Snapshot of the estimator output
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TempoEstimate {
    pub bpm: f64,
    pub hyper_bpm: f64,
    pub tempo_change: bool,
}

/// Fast + hyper-smoothed tempo tracker
#[derive(Debug, Clone)]
pub struct TempoEstimator {
    config: TempoConfig,
    beats: VecDeque<f64>,
    /// Beats added since the last `update()`
    pending: usize,
    fast_bpm: Option<f64>,
    hyper_bpm: Option<f64>,
    divergent: Vec<f64>,
    tempo_change: bool,
    bpm_history: VecDeque<f64>,
    stats: TempoStats,
}

impl TempoEstimator {
    pub fn new(config: TempoConfig) -> Self {
        Self {
            config,
            beats: VecDeque::with_capacity(BEAT_CAPACITY),
            pending: 0,
            fast_bpm: None,
            hyper_bpm: None,
            divergent: Vec::new(),
            tempo_change: false,
            bpm_history: VecDeque::with_capacity(BPM_HISTORY_CAPACITY),
            stats: TempoStats::default(),
        }
    }

    /// Record a raw onset (seconds). Intervals are evaluated on the next `update()`.
    pub fn add_beat(&mut self, time: f64) {
        if self.beats.len() == BEAT_CAPACITY {
            self.beats.pop_front();
        }
        self.beats.push_back(time);
        self.pending = (self.pending + 1).min(self.beats.len());
    }

    /// Fold every interval completed since the previous call into the averages
    pub fn update(&mut self) {
        let len = self.beats.len();
        let first = (len - self.pending).max(1);
        for i in first..len {
            let interval = self.beats[i] - self.beats[i - 1];
            self.process_interval(interval);
        }
        self.pending = 0;
    }

    fn process_interval(&mut self, interval: f64) {
        if !(interval.is_finite() && interval > 0.0) {
            self.stats.dropped += 1;
            return;
        }

        let mut bpm = 60.0 / interval;
        if bpm > self.config.double_count_ceiling {
            tracing::debug!("[Tempo] Halving double-counted interval: {:.1} BPM", bpm);
            bpm /= 2.0;
            self.stats.halved += 1;
        }

        if bpm < self.config.min_bpm || bpm > self.config.max_bpm {
            self.stats.dropped += 1;
            return;
        }

        if let Some(reference) = self.stable_hyper() {
            let deviation = (bpm - reference).abs() / reference;
            if deviation > self.config.outlier_tolerance {
                self.divergent.push(bpm);
                if self.divergent.len() >= self.config.tempo_change_intervals {
                    self.apply_tempo_change();
                }
                return;
            }
            self.resolve_divergent_as_outliers();
            self.tempo_change = false;
        }

        self.accept(bpm);
    }

    /// A consistent interval ended the divergent run, so it was noise
    fn resolve_divergent_as_outliers(&mut self) {
        self.stats.dropped += self.divergent.len() as u64;
        self.divergent.clear();
    }

    /// Several consecutive divergent intervals: reseed both averages on the new tempo
    fn apply_tempo_change(&mut self) {
        let new_bpm = self.divergent.iter().sum::<f64>() / self.divergent.len() as f64;
        tracing::info!(
            "[Tempo] Tempo change detected: {:.1} -> {:.1} BPM",
            self.hyper_bpm.unwrap_or_default(),
            new_bpm
        );
        self.fast_bpm = Some(new_bpm);
        self.hyper_bpm = Some(new_bpm);
        self.stats.accepted += self.divergent.len() as u64;
        self.divergent.clear();
        self.tempo_change = true;
        self.stats.tempo_changes += 1;
        self.push_history(new_bpm);
    }

    fn accept(&mut self, bpm: f64) {
        self.fast_bpm = Some(ema(self.fast_bpm, bpm, self.config.fast_alpha));
        self.hyper_bpm = Some(ema(self.hyper_bpm, bpm, self.config.hyper_alpha));
        self.stats.accepted += 1;
        self.push_history(bpm);
    }

    fn push_history(&mut self, bpm: f64) {
        if self.bpm_history.len() == BPM_HISTORY_CAPACITY {
            self.bpm_history.pop_front();
        }
        self.bpm_history.push_back(bpm);
    }

    fn is_ready(&self) -> bool {
        self.stats.accepted >= self.config.min_intervals as u64
    }

    fn stable_hyper(&self) -> Option<f64> {
        if self.is_ready() {
            self.hyper_bpm
        } else {
            None
        }
    }

    /// Fast-responding BPM, `None` until enough intervals were accepted
    pub fn bpm(&self) -> Option<f64> {
        if self.is_ready() {
            self.fast_bpm
        } else {
            None
        }
    }

    /// Hyper-smoothed BPM used for phrase timing
    pub fn hyper_bpm(&self) -> Option<f64> {
        self.stable_hyper()
    }

    pub fn estimate(&self) -> Option<TempoEstimate> {
        Some(TempoEstimate {
            bpm: self.bpm()?,
            hyper_bpm: self.hyper_bpm()?,
            tempo_change: self.tempo_change,
        })
    }

    pub fn is_tempo_change_detected(&self) -> bool {
        self.tempo_change
    }

    /// Blend an externally computed tempo into the hyper average
    ///
    /// The local estimate keeps the larger weight. Hints arriving before the
    /// local estimate is ready, or outside the plausible range, are ignored.
    pub fn set_server_bpm_hint(&mut self, bpm: f64) {
        if !bpm.is_finite() || bpm < self.config.min_bpm || bpm > self.config.max_bpm {
            tracing::debug!("[Tempo] Ignoring implausible server hint {}", bpm);
            return;
        }
        let Some(local) = self.stable_hyper() else {
            tracing::debug!("[Tempo] Ignoring server hint before local tempo is ready");
            return;
        };
        let weight = self.config.server_hint_weight;
        self.hyper_bpm = Some(local * (1.0 - weight) + bpm * weight);
    }

    /// Last accepted per-interval BPM values before smoothing, oldest first
    pub fn bpm_history(&self) -> Vec<f64> {
        self.bpm_history.iter().copied().collect()
    }

    pub fn stats(&self) -> TempoStats {
        self.stats
    }

    /// Divergent intervals not yet counted as accepted or dropped
    pub fn pending_divergent(&self) -> usize {
        self.divergent.len()
    }
}

fn ema(previous: Option<f64>, value: f64, alpha: f64) -> f64 {
    match previous {
        Some(prev) => prev + alpha * (value - prev),
        None => value,
    }
}
