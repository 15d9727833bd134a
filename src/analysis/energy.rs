// EnergyClassifier - online intensity clustering with hysteresis
//
// This module keeps a bounded window of RMS energy samples and periodically
// re-clusters it into five ordered intensity levels. A slowly smoothed running
// average is classified against those levels, and the median level's centre
// doubles as the dynamic pulse-detection threshold.
//
// Algorithm:
// 1. Seed five centres from the 10/30/50/70/90th percentiles of the window
// 2. Assign each sample to its nearest centre and recompute means (≤5 rounds)
// 3. Sort centres ascending
// 4. Each level accepts values inside a band widened by BAND_OVERLAP
// 5. A level switch needs the average to clear the midpoint by HYSTERESIS_FRACTION

use std::collections::VecDeque;

use crate::config::EnergyConfig;

/// Number of ordered intensity levels
pub const LEVEL_COUNT: usize = 5;

/// Level reported before enough samples exist
pub const UNKNOWN_LEVEL: u8 = 0;

/// Each band extends past the half-distance to its neighbour by this fraction
pub const BAND_OVERLAP: f64 = 0.25;

/// Share of the inter-level gap the average must clear beyond the midpoint
pub const HYSTERESIS_FRACTION: f64 = 0.15;

/// Percentiles used to seed the cluster centres
const SEED_PERCENTILES: [f64; LEVEL_COUNT] = [0.1, 0.3, 0.5, 0.7, 0.9];

const MAX_CLUSTER_ITERATIONS: usize = 5;

/// Centre movement below this counts as converged
const CONVERGENCE_EPSILON: f64 = 1e-12;

/// 1-based level whose centre is the pulse-detection threshold
const PULSE_THRESHOLD_LEVEL: usize = 3;

/// A single RMS measurement
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EnergySample {
    pub time: f64,
    pub value: f64,
}

/// One ordinal intensity level and its cluster centre
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EnergyLevel {
    /// 1..=5, ascending intensity
    pub level: u8,
    pub center: f64,
}

/// What changed during an `update()` call
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnergyUpdate {
    pub reclustered: bool,
    /// `(from, to)` when the classified level switched
    pub level_change: Option<(u8, u8)>,
}

/// Windowed energy clustering + hysteresis classification
#[derive(Debug, Clone)]
pub struct EnergyClassifier {
    config: EnergyConfig,
    samples: VecDeque<EnergySample>,
    temporal_average: Option<f64>,
    centers: Option<[f64; LEVEL_COUNT]>,
    last_cluster_time: Option<f64>,
    current_level: u8,
    cluster_passes: u64,
}

impl EnergyClassifier {
    pub fn new(config: EnergyConfig) -> Self {
        let capacity = config.buffer_capacity;
        Self {
            config,
            samples: VecDeque::with_capacity(capacity),
            temporal_average: None,
            centers: None,
            last_cluster_time: None,
            current_level: UNKNOWN_LEVEL,
            cluster_passes: 0,
        }
    }

    /// Push a sample into the ring buffer and update the temporal average
    ///
    /// Non-finite values are discarded.
    pub fn add_rms_sample(&mut self, time: f64, value: f64) {
        if !value.is_finite() {
            return;
        }
        if self.samples.len() >= self.config.buffer_capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(EnergySample { time, value });

        let alpha = self.config.temporal_alpha;
        self.temporal_average = Some(match self.temporal_average {
            Some(avg) => avg + alpha * (value - avg),
            None => value,
        });
    }

    /// Re-cluster when due and classify the current temporal average
    ///
    /// Clustering runs as soon as the minimum sample count is reached and then
    /// once per `recluster_interval_secs`. Below the minimum nothing happens and
    /// the level stays `UNKNOWN_LEVEL`.
    pub fn update(&mut self, now: f64) -> EnergyUpdate {
        let mut outcome = EnergyUpdate::default();
        if self.samples.len() < self.config.min_samples {
            return outcome;
        }

        let due = self
            .last_cluster_time
            .map(|last| now - last >= self.config.recluster_interval_secs)
            .unwrap_or(true);
        if due {
            let values: Vec<f64> = self.samples.iter().map(|s| s.value).collect();
            let centers = cluster_centers(&values);
            tracing::info!("[Energy] Re-clustered {} samples: {:?}", values.len(), centers);
            self.centers = Some(centers);
            self.last_cluster_time = Some(now);
            self.cluster_passes += 1;
            outcome.reclustered = true;
        }

        if let (Some(centers), Some(avg)) = (self.centers, self.temporal_average) {
            let next = classify_level(avg, &centers, self.current_level);
            if next != self.current_level {
                tracing::debug!(
                    "[Energy] Level {} -> {} (avg {:.4})",
                    self.current_level,
                    next,
                    avg
                );
                outcome.level_change = Some((self.current_level, next));
                self.current_level = next;
            }
        }

        outcome
    }

    /// Current level 1..=5, or `UNKNOWN_LEVEL` before the first clustering pass
    pub fn current_energy_level(&self) -> u8 {
        self.current_level
    }

    /// Dynamic pulse threshold (level 3 centre)
    pub fn pulse_threshold(&self) -> Option<f64> {
        self.centers.map(|c| c[PULSE_THRESHOLD_LEVEL - 1])
    }

    pub fn temporal_average(&self) -> Option<f64> {
        self.temporal_average
    }

    pub fn cluster_centers(&self) -> Option<[f64; LEVEL_COUNT]> {
        self.centers
    }

    pub fn levels(&self) -> Option<[EnergyLevel; LEVEL_COUNT]> {
        let centers = self.centers?;
        let mut levels = [EnergyLevel {
            level: 0,
            center: 0.0,
        }; LEVEL_COUNT];
        for (i, level) in levels.iter_mut().enumerate() {
            level.level = (i + 1) as u8;
            level.center = centers[i];
        }
        Some(levels)
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn cluster_passes(&self) -> u64 {
        self.cluster_passes
    }
}

/// 1-D k-means into `LEVEL_COUNT` centres, returned in ascending order
pub fn cluster_centers(values: &[f64]) -> [f64; LEVEL_COUNT] {
    let mut centers = [0.0; LEVEL_COUNT];
    if values.is_empty() {
        return centers;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let last = sorted.len() - 1;
    for (center, p) in centers.iter_mut().zip(SEED_PERCENTILES) {
        *center = sorted[(p * last as f64).floor() as usize];
    }

    for _ in 0..MAX_CLUSTER_ITERATIONS {
        let mut sums = [0.0; LEVEL_COUNT];
        let mut counts = [0usize; LEVEL_COUNT];
        for &v in values {
            let idx = nearest_center(v, &centers);
            sums[idx] += v;
            counts[idx] += 1;
        }

        let mut moved = false;
        for i in 0..LEVEL_COUNT {
            if counts[i] == 0 {
                continue;
            }
            let mean = sums[i] / counts[i] as f64;
            if (mean - centers[i]).abs() > CONVERGENCE_EPSILON {
                moved = true;
            }
            centers[i] = mean;
        }
        if !moved {
            break;
        }
    }

    centers.sort_by(f64::total_cmp);
    centers
}

/// Index of the closest centre; ties go to the lower index
fn nearest_center(value: f64, centers: &[f64]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, &c) in centers.iter().enumerate() {
        let distance = (value - c).abs();
        if distance < best_distance {
            best = i;
            best_distance = distance;
        }
    }
    best
}

/// Acceptance band of level index `i`, widened by `BAND_OVERLAP` toward each neighbour
fn band(centers: &[f64; LEVEL_COUNT], i: usize) -> (f64, f64) {
    let c = centers[i];
    let lower = if i == 0 {
        f64::NEG_INFINITY
    } else {
        c - (c - centers[i - 1]) / 2.0 * (1.0 + BAND_OVERLAP)
    };
    let upper = if i + 1 == LEVEL_COUNT {
        f64::INFINITY
    } else {
        c + (centers[i + 1] - c) / 2.0 * (1.0 + BAND_OVERLAP)
    };
    (lower, upper)
}

/// Classify `value` given the previous level, applying the hysteresis rule
pub fn classify_level(value: f64, centers: &[f64; LEVEL_COUNT], current: u8) -> u8 {
    let mut candidate: Option<usize> = None;
    for i in 0..LEVEL_COUNT {
        let (lower, upper) = band(centers, i);
        if value < lower || value > upper {
            continue;
        }
        let closer = candidate
            .map(|best| (value - centers[i]).abs() < (value - centers[best]).abs())
            .unwrap_or(true);
        if closer {
            candidate = Some(i);
        }
    }
    let candidate = candidate.unwrap_or_else(|| nearest_center(value, centers));
    let candidate_level = (candidate + 1) as u8;

    if current == UNKNOWN_LEVEL || current as usize > LEVEL_COUNT {
        return candidate_level;
    }
    if candidate_level == current {
        return current;
    }

    let old_center = centers[current as usize - 1];
    let new_center = centers[candidate];
    let midpoint = (old_center + new_center) / 2.0;
    let margin = (new_center - old_center).abs() * HYSTERESIS_FRACTION;

    let crossed = if new_center > old_center {
        value >= midpoint + margin
    } else {
        value <= midpoint - margin
    };

    if crossed {
        candidate_level
    } else {
        current
    }
}

#[cfg(test)]
#[path = "energy_tests.rs"]
mod tests;
