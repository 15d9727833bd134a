//! Prediction scoring and correct-fragment extraction
//!
//! Each realized slot may claim one predicted slot within ±1 position; a
//! predicted slot can be claimed at most once. Exact positions are tried
//! first, then the earlier neighbour, then the later one.

use serde::{Deserialize, Serialize};

use crate::prediction::pattern::{is_eighth_beat, PhrasePattern};

/// Offsets searched for a match, in priority order (±1 slot tolerance)
pub const MATCH_OFFSETS: [isize; 3] = [0, -1, 1];

/// Score of one prediction against the realized phrase
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccuracyRecord {
    /// Realized active slots matched by the prediction
    pub correct: usize,
    /// Realized active slots
    pub total: usize,
    /// `correct / total`, or 1.0/0.0 for a silent phrase
    pub accuracy: f64,
    /// Predicted active slots no realized slot claimed
    pub false_positives: usize,
}

/// `(actual_slot, predicted_slot)` pairs under one-to-one ±1 matching
pub fn match_slots(predicted: &[bool], actual: &[bool]) -> Vec<(usize, usize)> {
    let len = predicted.len().min(actual.len());
    let mut claimed = vec![false; len];
    let mut matches = Vec::new();

    for a in (0..len).filter(|&i| actual[i]) {
        for offset in MATCH_OFFSETS {
            let Some(p) = a.checked_add_signed(offset) else {
                continue;
            };
            if p < len && predicted[p] && !claimed[p] {
                claimed[p] = true;
                matches.push((a, p));
                break;
            }
        }
    }
    matches
}

/// Score `predicted` against `actual`
///
/// A silent realized phrase scores 1.0 only if the prediction was silent too.
pub fn calculate_prediction_accuracy(predicted: &[bool], actual: &[bool]) -> AccuracyRecord {
    let len = predicted.len().min(actual.len());
    let predicted_active = predicted[..len].iter().filter(|&&s| s).count();
    let total = actual[..len].iter().filter(|&&s| s).count();

    if total == 0 {
        return AccuracyRecord {
            correct: 0,
            total: 0,
            accuracy: if predicted_active == 0 { 1.0 } else { 0.0 },
            false_positives: predicted_active,
        };
    }

    let correct = match_slots(predicted, actual).len();
    AccuracyRecord {
        correct,
        total,
        accuracy: correct as f64 / total as f64,
        false_positives: predicted_active - correct,
    }
}

/// Slots of the prediction that matched real pulses, snapped toward 8th-beat alignment
///
/// For each match the realized slot is recorded if it is 8th-beat aligned,
/// otherwise the predicted slot. Durations come from the realized phrase,
/// falling back to the prediction's.
pub fn extract_correct_fragment(predicted: &PhrasePattern, actual: &PhrasePattern) -> PhrasePattern {
    let mut fragment = PhrasePattern::default();
    for (a, p) in match_slots(&predicted.slots, &actual.slots) {
        let slot = if is_eighth_beat(a) { a } else { p };
        fragment.set_active(slot);
        if let Some(d) = actual.duration(a).or_else(|| predicted.duration(p)) {
            fragment.set_duration(slot, d);
        }
    }
    fragment
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: bool = true;
    const F: bool = false;

    #[test]
    fn test_one_slot_tolerance() {
        let record = calculate_prediction_accuracy(&[T, F, F, F], &[F, T, F, F]);
        assert_eq!(record.correct, 1);
        assert_eq!(record.total, 1);
        assert_eq!(record.accuracy, 1.0);
        assert_eq!(record.false_positives, 0);
    }

    #[test]
    fn test_two_slots_away_is_a_miss() {
        let record = calculate_prediction_accuracy(&[T, F, F, F], &[F, F, T, F]);
        assert_eq!(record.correct, 0);
        assert_eq!(record.accuracy, 0.0);
        assert_eq!(record.false_positives, 1);
    }

    #[test]
    fn test_matching_is_one_to_one() {
        // Two realized hits around a single predicted slot
        let record = calculate_prediction_accuracy(&[F, T, F, F], &[T, F, T, F]);
        assert_eq!(record.correct, 1);
        assert_eq!(record.total, 2);
        assert_eq!(record.accuracy, 0.5);
        assert_eq!(record.false_positives, 0);
    }

    #[test]
    fn test_exact_match_preferred() {
        let matches = match_slots(&[T, T, F, F], &[F, T, F, F]);
        assert_eq!(matches, vec![(1, 1)]);
    }

    #[test]
    fn test_equidistant_tie_takes_lower_slot() {
        let matches = match_slots(&[T, F, T, F], &[F, T, F, F]);
        assert_eq!(matches, vec![(1, 0)]);
    }

    #[test]
    fn test_silent_phrase_scoring() {
        let silent = [F; 8];
        let record = calculate_prediction_accuracy(&silent, &silent);
        assert_eq!(record.accuracy, 1.0);
        assert_eq!(record.total, 0);

        let mut predicted = [F; 8];
        predicted[4] = T;
        let record = calculate_prediction_accuracy(&predicted, &silent);
        assert_eq!(record.accuracy, 0.0);
        assert_eq!(record.false_positives, 1);
    }

    #[test]
    fn test_false_positives_counted() {
        let record = calculate_prediction_accuracy(&[T, F, F, T, F, T], &[T, F, F, F, F, F]);
        assert_eq!(record.correct, 1);
        assert_eq!(record.false_positives, 2);
    }

    #[test]
    fn test_fragment_prefers_eighth_beat_alignment() {
        // Realized 4 (on grid) matched predicted 5: record 4
        let predicted = PhrasePattern::from_active(&[5]);
        let actual = PhrasePattern::from_active(&[4]);
        assert_eq!(
            extract_correct_fragment(&predicted, &actual).active_slots(),
            vec![4]
        );

        // Realized 9 matched predicted 8 (on grid): record 8
        let predicted = PhrasePattern::from_active(&[8]);
        let actual = PhrasePattern::from_active(&[9]);
        assert_eq!(
            extract_correct_fragment(&predicted, &actual).active_slots(),
            vec![8]
        );

        // Neither aligned: record the predicted slot
        let predicted = PhrasePattern::from_active(&[10]);
        let actual = PhrasePattern::from_active(&[11]);
        assert_eq!(
            extract_correct_fragment(&predicted, &actual).active_slots(),
            vec![10]
        );
    }

    #[test]
    fn test_fragment_carries_realized_duration() {
        let predicted = PhrasePattern::from_active(&[0, 16]);
        let mut actual = PhrasePattern::from_active(&[0, 20]);
        actual.set_duration(0, 6.0);
        let fragment = extract_correct_fragment(&predicted, &actual);
        assert_eq!(fragment.active_slots(), vec![0]);
        assert_eq!(fragment.duration(0), Some(6.0));
    }
}
