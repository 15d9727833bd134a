//! Quantizer - phrase timing and slot quantization
//!
//! Maps pulse times onto the 32-slot grid of the phrase that is being
//! accumulated. Phrase and slot lengths are derived from the hyper-smoothed
//! BPM, so the grid is stable across small tempo wobbles.

use crate::prediction::pattern::{BEATS_PER_PHRASE, SLOTS_PER_PHRASE};

/// Seconds spanned by one 4-beat phrase
pub fn phrase_duration(bpm: f64) -> f64 {
    BEATS_PER_PHRASE as f64 * 60.0 / bpm
}

/// Seconds spanned by one slot (a 32nd note)
pub fn slot_duration(bpm: f64) -> f64 {
    phrase_duration(bpm) / SLOTS_PER_PHRASE as f64
}

/// Slack absorbing float error when a pulse lands exactly on the boundary
const BOUNDARY_EPSILON: f64 = 1e-9;

/// Usable tempo for grid arithmetic
pub fn is_valid_bpm(bpm: f64) -> bool {
    bpm.is_finite() && bpm > 0.0
}

/// Grid anchored at a phrase start for a given tempo
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantizer {
    phrase_start: f64,
    slot_secs: f64,
}

impl Quantizer {
    pub fn new(phrase_start: f64, bpm: f64) -> Self {
        Self {
            phrase_start,
            slot_secs: slot_duration(bpm),
        }
    }

    /// Nearest slot to `time`, clamped into the phrase
    pub fn quantize(&self, time: f64) -> usize {
        let position = ((time - self.phrase_start) / self.slot_secs).round();
        if position <= 0.0 {
            0
        } else {
            (position as usize).min(SLOTS_PER_PHRASE - 1)
        }
    }

    /// Whether the full 4-beat phrase has elapsed at `time`
    ///
    /// Earlier pulses stay in this phrase; `quantize` clamps them to slot 31.
    pub fn has_elapsed(&self, time: f64) -> bool {
        time - self.phrase_start >= self.phrase_secs() - BOUNDARY_EPSILON
    }

    pub fn phrase_secs(&self) -> f64 {
        self.slot_secs * SLOTS_PER_PHRASE as f64
    }

    pub fn phrase_end(&self) -> f64 {
        self.phrase_start + self.phrase_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_durations_at_120_bpm() {
        assert!((phrase_duration(120.0) - 2.0).abs() < 1e-12);
        assert!((slot_duration(120.0) - 0.0625).abs() < 1e-12);
    }

    #[test]
    fn test_quantize_rounds_to_nearest_slot() {
        let q = Quantizer::new(10.0, 120.0);
        assert_eq!(q.quantize(10.0), 0);
        assert_eq!(q.quantize(10.03), 0);
        assert_eq!(q.quantize(10.04), 1);
        assert_eq!(q.quantize(10.5), 8);
        assert_eq!(q.quantize(11.5), 24);
    }

    #[test]
    fn test_quantize_clamps() {
        let q = Quantizer::new(10.0, 120.0);
        assert_eq!(q.quantize(9.0), 0);
        assert_eq!(q.quantize(11.98), 31);
        assert_eq!(q.quantize(15.0), 31);
    }

    #[test]
    fn test_phrase_end_detection() {
        let q = Quantizer::new(0.0, 120.0);
        assert!(!q.has_elapsed(1.9));
        assert!(!q.has_elapsed(1.975));
        assert_eq!(q.quantize(1.975), 31);
        assert!(q.has_elapsed(2.0));
        assert!(q.has_elapsed(2.0 - 1e-12));

        // Boundary pulse at a tempo that is not a power-of-two fraction
        let q = Quantizer::new(0.3, 100.0);
        assert!(q.has_elapsed(0.3 + 2.4));
        assert!((q.phrase_end() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_bpm_validation() {
        assert!(is_valid_bpm(90.0));
        assert!(!is_valid_bpm(0.0));
        assert!(!is_valid_bpm(-10.0));
        assert!(!is_valid_bpm(f64::NAN));
    }
}
