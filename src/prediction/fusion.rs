//! Hyper-prediction: fusing the history- and fragment-based predictors

use crate::prediction::pattern::{PhrasePattern, Prediction, SLOTS_PER_PHRASE};
use crate::prediction::voting::apply_eighth_beat_preference;

/// Combine both predictors into the hyper-prediction
///
/// Slots both predictors agree on are kept. A slot only one predictor supports
/// is kept as well: 8th-beat slots unconditionally, off-grid slots subject to
/// the eighth-beat preference pass that runs last. Durations of kept slots are
/// the mean of whichever sides carry one.
///
/// Returns `None` only when neither predictor has an opinion yet.
pub fn fuse_predictions(
    history_based: Option<&Prediction>,
    fragment_based: Option<&Prediction>,
) -> Option<Prediction> {
    if history_based.is_none() && fragment_based.is_none() {
        return None;
    }
    let empty = PhrasePattern::default();
    let a = history_based.unwrap_or(&empty);
    let b = fragment_based.unwrap_or(&empty);

    let mut fused = PhrasePattern::default();
    for slot in 0..SLOTS_PER_PHRASE {
        let (in_a, in_b) = (a.slots[slot], b.slots[slot]);
        if !(in_a || in_b) {
            continue;
        }
        fused.slots[slot] = true;

        let da = if in_a { a.durations[slot] } else { None };
        let db = if in_b { b.durations[slot] } else { None };
        fused.durations[slot] = match (da, db) {
            (Some(x), Some(y)) => Some((x + y) / 2.0),
            (Some(x), None) | (None, Some(x)) => Some(x),
            (None, None) => None,
        };
    }

    apply_eighth_beat_preference(&mut fused);
    Some(fused)
}
