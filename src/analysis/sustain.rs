//! Sustained-beat detection
//!
//! After a pulse, energy that keeps climbing means the sound is being held.
//! Once the climb stops, the elapsed time is converted into 32nd-note units
//! and handed to the rhythm predictor as a duration for the pulse's slot.

/// Pulses held for longer than this many beats are abandoned
const MAX_SUSTAIN_BEATS: f64 = 4.0;

/// Minimum rise over the starting energy, relative to it, to count as sustained
const MIN_RELATIVE_RISE: f64 = 0.05;

/// 32nd notes per beat (beat = quarter note)
const THIRTY_SECONDS_PER_BEAT: f64 = 8.0;

/// A completed sustain measurement
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SustainedBeat {
    /// Time of the pulse that started the sustain
    pub start_time: f64,
    /// Held length in 32nd notes (≥ 1)
    pub duration_32nd: u32,
}

/// Converts post-pulse energy rise into durations
pub trait SustainDetector: Send {
    /// Mark a candidate sustain start
    fn process_pulse(&mut self, time: f64, energy_avg: f64);

    /// Called per energy sample; returns a measurement once the energy stops climbing
    fn process_diagnostic(&mut self, time: f64, energy_avg: f64, bpm: f64)
        -> Option<SustainedBeat>;

    fn reset(&mut self);
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    start_time: f64,
    start_energy: f64,
    peak_energy: f64,
}

/// Default detector tracking a single candidate at a time
#[derive(Debug, Clone, Default)]
pub struct EnergySustainDetector {
    candidate: Option<Candidate>,
}

impl EnergySustainDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_candidate(&self) -> bool {
        self.candidate.is_some()
    }
}

impl SustainDetector for EnergySustainDetector {
    fn process_pulse(&mut self, time: f64, energy_avg: f64) {
        self.candidate = Some(Candidate {
            start_time: time,
            start_energy: energy_avg,
            peak_energy: energy_avg,
        });
    }

    fn process_diagnostic(
        &mut self,
        time: f64,
        energy_avg: f64,
        bpm: f64,
    ) -> Option<SustainedBeat> {
        let mut candidate = self.candidate?;
        if !(bpm.is_finite() && bpm > 0.0) {
            return None;
        }

        let beat_secs = 60.0 / bpm;
        let elapsed = time - candidate.start_time;
        if elapsed > MAX_SUSTAIN_BEATS * beat_secs {
            self.candidate = None;
            return None;
        }

        if energy_avg >= candidate.peak_energy {
            candidate.peak_energy = energy_avg;
            self.candidate = Some(candidate);
            return None;
        }

        self.candidate = None;
        let rise = candidate.peak_energy - candidate.start_energy;
        if rise <= candidate.start_energy.abs() * MIN_RELATIVE_RISE {
            return None;
        }

        let unit = beat_secs / THIRTY_SECONDS_PER_BEAT;
        let duration_32nd = ((elapsed / unit).round() as u32).max(1);
        tracing::debug!(
            "[Sustain] Pulse at {:.3}s held for {} 32nds",
            candidate.start_time,
            duration_32nd
        );
        Some(SustainedBeat {
            start_time: candidate.start_time,
            duration_32nd,
        })
    }

    fn reset(&mut self) {
        self.candidate = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_candidate_no_output() {
        let mut detector = EnergySustainDetector::new();
        assert!(detector.process_diagnostic(0.1, 0.5, 120.0).is_none());
    }

    #[test]
    fn test_rise_then_fall_reports_duration() {
        let mut detector = EnergySustainDetector::new();
        detector.process_pulse(1.0, 0.1);

        // 120 BPM: a 32nd note lasts 62.5 ms
        assert!(detector.process_diagnostic(1.05, 0.2, 120.0).is_none());
        assert!(detector.process_diagnostic(1.15, 0.3, 120.0).is_none());
        assert!(detector.process_diagnostic(1.25, 0.3, 120.0).is_none());

        let sustained = detector.process_diagnostic(1.25, 0.25, 120.0).unwrap();
        assert_eq!(sustained.start_time, 1.0);
        assert_eq!(sustained.duration_32nd, 4);
        assert!(!detector.has_candidate());
    }

    #[test]
    fn test_immediate_decay_is_not_sustained() {
        let mut detector = EnergySustainDetector::new();
        detector.process_pulse(0.0, 0.4);
        assert!(detector.process_diagnostic(0.01, 0.39, 120.0).is_none());
        assert!(!detector.has_candidate());
    }

    #[test]
    fn test_candidate_abandoned_after_max_length() {
        let mut detector = EnergySustainDetector::new();
        detector.process_pulse(0.0, 0.1);
        // 4 beats at 120 BPM = 2 s
        assert!(detector.process_diagnostic(2.5, 0.9, 120.0).is_none());
        assert!(!detector.has_candidate());
    }

    #[test]
    fn test_invalid_bpm_keeps_candidate() {
        let mut detector = EnergySustainDetector::new();
        detector.process_pulse(0.0, 0.1);
        assert!(detector.process_diagnostic(0.1, 0.2, 0.0).is_none());
        assert!(detector.has_candidate());
    }
}
