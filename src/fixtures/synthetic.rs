//! Deterministic synthetic session traces.
//!
//! Generates a pulse stream for a fixed slot pattern plus a matching RMS
//! envelope (noise floor with a decaying burst per pulse), seeded so the same
//! spec always yields the same trace.

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{SessionTrace, TraceEvent};
use crate::error::TraceError;
use crate::prediction::pattern::SLOTS_PER_PHRASE;
use crate::prediction::quantizer::{is_valid_bpm, phrase_duration, slot_duration};

/// Decay time constant of the per-pulse energy burst
const BURST_DECAY_SECS: f64 = 0.05;

/// Configuration for synthetic traces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyntheticSpec {
    #[serde(default = "default_bpm")]
    pub bpm: f64,
    #[serde(default = "default_phrases")]
    pub phrases: usize,
    /// Active slots repeated every phrase
    #[serde(default = "default_slots")]
    pub active_slots: Vec<usize>,
    /// Optional second pattern; phrases alternate between the two when set
    #[serde(default)]
    pub alternate_slots: Option<Vec<usize>>,
    /// Energy samples per second; 0 emits pulses only
    #[serde(default = "default_sample_rate")]
    pub sample_rate_hz: f64,
    /// Uniform timing jitter applied to every pulse
    #[serde(default)]
    pub jitter_ms: f64,
    #[serde(default = "default_noise_floor")]
    pub noise_floor: f64,
    #[serde(default = "default_pulse_energy")]
    pub pulse_energy: f64,
    #[serde(default)]
    pub seed: u64,
}

fn default_bpm() -> f64 {
    120.0
}

fn default_phrases() -> usize {
    8
}

fn default_slots() -> Vec<usize> {
    vec![0, 8, 16, 24]
}

fn default_sample_rate() -> f64 {
    100.0
}

fn default_noise_floor() -> f64 {
    0.02
}

fn default_pulse_energy() -> f64 {
    0.6
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            bpm: default_bpm(),
            phrases: default_phrases(),
            active_slots: default_slots(),
            alternate_slots: None,
            sample_rate_hz: default_sample_rate(),
            jitter_ms: 0.0,
            noise_floor: default_noise_floor(),
            pulse_energy: default_pulse_energy(),
            seed: 0,
        }
    }
}

impl SyntheticSpec {
    pub fn validate(&self) -> Result<(), TraceError> {
        let invalid = |reason: &str| -> Result<(), TraceError> {
            Err(TraceError::InvalidTrace {
                reason: reason.to_string(),
            })
        };
        if !is_valid_bpm(self.bpm) {
            return invalid("synthetic bpm must be positive");
        }
        if self.phrases == 0 {
            return invalid("synthetic trace needs at least one phrase");
        }
        let mut slots = self
            .active_slots
            .iter()
            .chain(self.alternate_slots.iter().flatten());
        if slots.any(|&s| s >= SLOTS_PER_PHRASE) {
            return invalid("active slots must be below 32");
        }
        if !(self.sample_rate_hz.is_finite() && self.sample_rate_hz >= 0.0) {
            return invalid("sample rate must be finite and non-negative");
        }
        if !(self.jitter_ms.is_finite() && self.jitter_ms >= 0.0) {
            return invalid("jitter must be finite and non-negative");
        }
        Ok(())
    }

    /// Pulse times in order, jitter applied
    pub fn pulse_times(&self) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let phrase_secs = phrase_duration(self.bpm);
        let slot_secs = slot_duration(self.bpm);
        let jitter_secs = self.jitter_ms / 1000.0;

        let mut times = Vec::new();
        for phrase in 0..self.phrases {
            let slots = match &self.alternate_slots {
                Some(alternate) if phrase % 2 == 1 => alternate,
                _ => &self.active_slots,
            };
            let mut sorted = slots.clone();
            sorted.sort_unstable();
            sorted.dedup();

            for slot in sorted {
                let offset = if jitter_secs > 0.0 {
                    rng.gen_range(-jitter_secs..=jitter_secs)
                } else {
                    0.0
                };
                let time = phrase as f64 * phrase_secs + slot as f64 * slot_secs + offset;
                times.push(time.max(0.0));
            }
        }
        times.sort_by(f64::total_cmp);
        times
    }

    /// Build the full trace
    pub fn generate(&self, id: impl Into<String>) -> Result<SessionTrace, TraceError> {
        self.validate()?;
        let pulses = self.pulse_times();
        let duration = self.phrases as f64 * phrase_duration(self.bpm);

        let mut events: Vec<TraceEvent> = Vec::new();
        if self.sample_rate_hz > 0.0 {
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(1));
            let step = 1.0 / self.sample_rate_hz;
            let sample_count = (duration * self.sample_rate_hz).floor() as usize;
            let mut next_pulse = 0usize;
            let mut last_pulse: Option<f64> = None;

            for i in 0..=sample_count {
                let time = i as f64 * step;
                while next_pulse < pulses.len() && pulses[next_pulse] <= time {
                    events.push(TraceEvent::Pulse {
                        time: pulses[next_pulse],
                    });
                    last_pulse = Some(pulses[next_pulse]);
                    next_pulse += 1;
                }
                let burst = last_pulse
                    .map(|p| self.pulse_energy * (-(time - p) / BURST_DECAY_SECS).exp())
                    .unwrap_or(0.0);
                let noise = self.noise_floor * rng.gen_range(0.5..1.5);
                events.push(TraceEvent::Energy {
                    time,
                    rms: noise + burst,
                });
            }
            events.extend(
                pulses[next_pulse..]
                    .iter()
                    .map(|&time| TraceEvent::Pulse { time }),
            );
        } else {
            events.extend(pulses.iter().map(|&time| TraceEvent::Pulse { time }));
        }

        let mut trace = SessionTrace {
            id: id.into(),
            metadata: Default::default(),
            events,
        };
        trace
            .metadata
            .insert("generator".to_string(), "synthetic".to_string());
        trace
            .metadata
            .insert("bpm".to_string(), format!("{}", self.bpm));
        Ok(trace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pulse_times_follow_slots() {
        let spec = SyntheticSpec {
            phrases: 2,
            sample_rate_hz: 0.0,
            ..SyntheticSpec::default()
        };
        let times = spec.pulse_times();
        assert_eq!(times, vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5]);
    }

    #[test]
    fn test_alternating_patterns() {
        let spec = SyntheticSpec {
            phrases: 2,
            active_slots: vec![0],
            alternate_slots: Some(vec![4, 12]),
            sample_rate_hz: 0.0,
            ..SyntheticSpec::default()
        };
        assert_eq!(spec.pulse_times(), vec![0.0, 2.25, 2.75]);
    }

    #[test]
    fn test_same_seed_same_trace() {
        let spec = SyntheticSpec {
            jitter_ms: 5.0,
            seed: 42,
            ..SyntheticSpec::default()
        };
        let a = spec.generate("a").unwrap();
        let b = spec.generate("a").unwrap();
        assert_eq!(a, b);
        assert!(a.validate().is_ok());
    }

    #[test]
    fn test_energy_samples_cover_duration() {
        let spec = SyntheticSpec {
            phrases: 1,
            ..SyntheticSpec::default()
        };
        let trace = spec.generate("energy").unwrap();
        let energy = trace
            .events
            .iter()
            .filter(|e| matches!(e, TraceEvent::Energy { .. }))
            .count();
        // 2 seconds at 100 Hz, both ends included
        assert_eq!(energy, 201);
        assert_eq!(
            trace
                .events
                .iter()
                .filter(|e| matches!(e, TraceEvent::Pulse { .. }))
                .count(),
            4
        );
    }

    #[test]
    fn test_invalid_specs_rejected() {
        let spec = SyntheticSpec {
            active_slots: vec![32],
            ..SyntheticSpec::default()
        };
        assert!(matches!(
            spec.generate("bad"),
            Err(TraceError::InvalidTrace { .. })
        ));

        let spec = SyntheticSpec {
            bpm: 0.0,
            ..SyntheticSpec::default()
        };
        assert!(spec.validate().is_err());
    }
}
