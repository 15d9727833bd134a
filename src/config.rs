//! Configuration management for engine parameter tuning
//!
//! This module provides runtime configuration loading from JSON files,
//! enabling fast iteration without recompilation. Operational parameters
//! (smoothing factors, BPM bounds, buffer capacities) live here; the tuned
//! prediction thresholds stay as named constants next to the code that uses them.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tempo: TempoConfig,
    pub energy: EnergyConfig,
    pub predictor: PredictorConfig,
    pub session: SessionConfig,
}

/// Tempo estimator parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    /// EMA factor for the fast-responding BPM
    pub fast_alpha: f64,
    /// EMA factor for the hyper-smoothed BPM used for phrase timing
    pub hyper_alpha: f64,
    /// Lowest plausible tempo; slower intervals are dropped
    pub min_bpm: f64,
    /// Highest plausible tempo after double-count correction
    pub max_bpm: f64,
    /// Implied BPM above this is assumed to be a double count and halved
    pub double_count_ceiling: f64,
    /// Relative deviation from the hyper estimate tolerated before an interval is an outlier
    pub outlier_tolerance: f64,
    /// Consecutive divergent intervals that signal a deliberate tempo change
    pub tempo_change_intervals: usize,
    /// Weight of an external BPM hint when blended into the hyper average
    pub server_hint_weight: f64,
    /// Accepted intervals required before accessors report a tempo
    pub min_intervals: usize,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            fast_alpha: 0.3,
            hyper_alpha: 0.05,
            min_bpm: 40.0,
            max_bpm: 200.0,
            double_count_ceiling: 200.0,
            outlier_tolerance: 0.3,
            tempo_change_intervals: 4,
            server_hint_weight: 0.3,
            min_intervals: 3,
        }
    }
}

/// Energy classifier parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyConfig {
    /// Ring buffer capacity (≈60 s at 100 Hz)
    pub buffer_capacity: usize,
    /// EMA factor for the temporal average that gets classified
    pub temporal_alpha: f64,
    /// Seconds between re-clustering passes
    pub recluster_interval_secs: f64,
    /// Samples required before clustering and classification start
    pub min_samples: usize,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 6000,
            temporal_alpha: 0.05,
            recluster_interval_secs: 60.0,
            min_samples: 50,
        }
    }
}

/// Rhythm predictor bounded-list capacities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    pub history_capacity: usize,
    pub fragment_capacity: usize,
    pub accuracy_capacity: usize,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            history_capacity: 16,
            fragment_capacity: 20,
            accuracy_capacity: 32,
        }
    }
}

/// Session wiring options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Derive pulses from upward crossings of the energy pulse threshold
    pub auto_detect_pulses: bool,
    /// Minimum spacing between auto-detected pulses
    pub pulse_debounce_ms: u64,
    /// Bounded telemetry history length
    pub telemetry_history: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_detect_pulses: false,
            pulse_debounce_ms: 120,
            telemetry_history: 256,
        }
    }
}

impl EngineConfig {
    /// Load configuration from JSON file
    ///
    /// Missing files and invalid JSON fall back to defaults with a warning,
    /// so a broken config never prevents a session from starting.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Check value ranges that would otherwise produce NaN tempos or empty buffers
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_alpha("tempo.fast_alpha", self.tempo.fast_alpha)?;
        check_alpha("tempo.hyper_alpha", self.tempo.hyper_alpha)?;
        check_alpha("tempo.server_hint_weight", self.tempo.server_hint_weight)?;
        check_alpha("energy.temporal_alpha", self.energy.temporal_alpha)?;

        let tempo = &self.tempo;
        if !(tempo.min_bpm > 0.0 && tempo.min_bpm < tempo.max_bpm) {
            return Err(ConfigError::InvalidBpmRange {
                min: tempo.min_bpm,
                max: tempo.max_bpm,
            });
        }

        check_capacity("energy.buffer_capacity", self.energy.buffer_capacity)?;
        check_capacity("energy.min_samples", self.energy.min_samples)?;
        check_capacity("tempo.min_intervals", tempo.min_intervals)?;
        check_capacity("tempo.tempo_change_intervals", tempo.tempo_change_intervals)?;
        check_capacity("predictor.history_capacity", self.predictor.history_capacity)?;
        check_capacity("predictor.fragment_capacity", self.predictor.fragment_capacity)?;
        check_capacity("predictor.accuracy_capacity", self.predictor.accuracy_capacity)?;
        check_capacity("session.telemetry_history", self.session.telemetry_history)?;
        Ok(())
    }
}

fn check_alpha(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidSmoothing { field, value })
    }
}

fn check_capacity(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        Err(ConfigError::ZeroCapacity { field })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.energy.buffer_capacity, 6000);
        assert_eq!(config.energy.temporal_alpha, 0.05);
        assert_eq!(config.predictor.history_capacity, 16);
        assert_eq!(config.predictor.fragment_capacity, 20);
        assert_eq!(config.predictor.accuracy_capacity, 32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = EngineConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let parsed: EngineConfig =
            serde_json::from_str(r#"{ "tempo": { "max_bpm": 180.0 } }"#).unwrap();
        assert_eq!(parsed.tempo.max_bpm, 180.0);
        assert_eq!(parsed.tempo.min_bpm, 40.0);
        assert_eq!(parsed.energy, EnergyConfig::default());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = EngineConfig::load_from_file("/nonexistent/rhythm_engine.json");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join("rhythm_engine_config_test.json");
        fs::write(&path, r#"{ "session": { "auto_detect_pulses": true } }"#).unwrap();
        let config = EngineConfig::load_from_file(&path);
        assert!(config.session.auto_detect_pulses);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.tempo.hyper_alpha = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSmoothing {
                field: "tempo.hyper_alpha",
                ..
            })
        ));

        let mut config = EngineConfig::default();
        config.tempo.min_bpm = 220.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBpmRange { .. })
        ));

        let mut config = EngineConfig::default();
        config.predictor.history_capacity = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroCapacity { .. })
        ));
    }
}
