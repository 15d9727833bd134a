//! Energy-threshold pulse detection
//!
//! Turns the RMS stream into discrete pulses: a pulse fires on an upward
//! crossing of the dynamic threshold, with a debounce window so one hit is
//! never counted twice.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseCrossing {
    pub time: f64,
    pub rms: f64,
}

#[derive(Debug)]
pub struct LevelCrossingDetector {
    prev_rms: f64,
    last_capture_time: Option<f64>,
    debounce_secs: f64,
}

impl LevelCrossingDetector {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            prev_rms: 0.0,
            last_capture_time: None,
            debounce_secs: debounce_ms as f64 / 1000.0,
        }
    }

    /// Reset internal state (e.g. when a session restarts)
    pub fn reset(&mut self) {
        self.prev_rms = 0.0;
        self.last_capture_time = None;
    }

    pub fn last_capture_time(&self) -> Option<f64> {
        self.last_capture_time
    }

    /// Process a new RMS value (simple crossing with debounce)
    pub fn process(&mut self, rms: f64, threshold: f64, time: f64) -> Option<PulseCrossing> {
        let in_debounce = self
            .last_capture_time
            .map(|last| time - last < self.debounce_secs)
            .unwrap_or(false);
        if in_debounce {
            self.prev_rms = rms;
            return None;
        }

        let crossed = self.prev_rms < threshold && rms >= threshold;
        self.prev_rms = rms;

        if crossed {
            self.last_capture_time = Some(time);
            Some(PulseCrossing { time, rms })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crossing_with_debounce() {
        let mut detector = LevelCrossingDetector::new(100);
        let threshold = 0.5;

        // Below threshold
        assert!(detector.process(0.1, threshold, 1.0).is_none());

        // Crossing
        let crossing = detector.process(0.6, threshold, 1.01).unwrap();
        assert_eq!(crossing.time, 1.01);

        // Debounce active - drop low then rise again within 100 ms
        assert!(detector.process(0.1, threshold, 1.03).is_none());
        assert!(detector.process(0.6, threshold, 1.05).is_none());

        // Debounce expired; reset low first to enable crossing
        assert!(detector.process(0.1, threshold, 1.2).is_none());
        assert!(detector.process(0.6, threshold, 1.21).is_some());
    }

    #[test]
    fn test_staying_above_threshold_fires_once() {
        let mut detector = LevelCrossingDetector::new(50);
        assert!(detector.process(0.7, 0.5, 0.0).is_some());
        assert!(detector.process(0.8, 0.5, 0.5).is_none());
        assert!(detector.process(0.9, 0.5, 1.0).is_none());
    }

    #[test]
    fn test_reset_clears_capture() {
        let mut detector = LevelCrossingDetector::new(100);
        detector.process(0.9, 0.5, 0.0);
        assert_eq!(detector.last_capture_time(), Some(0.0));
        detector.reset();
        assert_eq!(detector.last_capture_time(), None);
    }
}
