//! History- and fragment-based prediction
//!
//! Both predictors look at a list of past patterns and guess the next phrase:
//! - cycle detection: the recent block of 2–4 phrases repeats the block before it
//! - frequency voting: per-slot majority over the last few entries, with a
//!   lower bar for 8th-beat slots
//! - cycle re-vote: with enough history, entries at the same position in a
//!   4-phrase cycle vote again and are OR-ed in
//! - eighth-beat preference: off-grid slots next to an active 8th-beat slot
//!   in the same beat are treated as noise

use crate::prediction::pattern::{
    beat_of, is_eighth_beat, PhrasePattern, Prediction, SLOTS_PER_PHRASE,
};

/// Per-slot equality two phrases need to count as the same phrase
pub const SIMILARITY_THRESHOLD: f64 = 0.8;

/// Cycle lengths tried by cycle detection, shortest first
pub const CYCLE_LENGTHS: std::ops::RangeInclusive<usize> = 2..=4;

/// Entries considered by frequency voting
pub const VOTE_WINDOW: usize = 4;

/// Majority needed for an 8th-beat slot
pub const EIGHTH_BEAT_MAJORITY: f64 = 0.4;

/// Majority needed for any other slot
pub const OFFBEAT_MAJORITY: f64 = 0.5;

/// Phrase cycle assumed by the positional re-vote
pub const PHRASE_CYCLE: usize = 4;

/// Entries required before the positional re-vote runs
pub const CYCLE_REVOTE_MIN_ENTRIES: usize = 8;

/// Predictor A: cycle detection over raw phrase history, falling back to voting
pub fn predict_from_history(history: &[PhrasePattern]) -> Option<Prediction> {
    if history.is_empty() {
        return None;
    }

    let mut prediction = match detect_cycle(history) {
        Some(next) => next,
        None => frequency_vote(history),
    };
    apply_eighth_beat_preference(&mut prediction);
    Some(prediction)
}

/// Predictor B: the same voting over the correct-fragment archive
pub fn predict_from_fragments(fragments: &[PhrasePattern]) -> Option<Prediction> {
    if fragments.is_empty() {
        return None;
    }

    let mut prediction = frequency_vote(fragments);
    apply_eighth_beat_preference(&mut prediction);
    Some(prediction)
}

/// Next phrase of a repeating block, if the newest block repeats the one before it
pub fn detect_cycle(history: &[PhrasePattern]) -> Option<PhrasePattern> {
    let n = history.len();
    for cycle in CYCLE_LENGTHS {
        if n < cycle * 2 {
            break;
        }
        let recent = &history[n - cycle..];
        let previous = &history[n - 2 * cycle..n - cycle];
        let repeats = recent
            .iter()
            .zip(previous)
            .all(|(a, b)| a.similarity(b) >= SIMILARITY_THRESHOLD);
        if repeats {
            tracing::debug!("[Predictor] Detected {}-phrase cycle", cycle);
            return Some(history[n - cycle]);
        }
    }
    None
}

/// Majority vote over the last `VOTE_WINDOW` entries, plus the positional re-vote
pub fn frequency_vote(entries: &[PhrasePattern]) -> PhrasePattern {
    let n = entries.len();
    let window = &entries[n.saturating_sub(VOTE_WINDOW)..];
    let mut result = vote(window.iter());

    if n >= CYCLE_REVOTE_MIN_ENTRIES {
        // Entries one full cycle, two cycles, ... before the phrase being predicted
        let same_position = entries
            .iter()
            .enumerate()
            .filter(|(i, _)| (n - i) % PHRASE_CYCLE == 0)
            .map(|(_, p)| p);
        let positional = vote(same_position);
        for slot in 0..SLOTS_PER_PHRASE {
            if positional.slots[slot] && !result.slots[slot] {
                result.slots[slot] = true;
                result.durations[slot] = positional.durations[slot];
            }
        }
    }

    result
}

/// Per-slot majority with averaged durations
fn vote<'a>(entries: impl Iterator<Item = &'a PhrasePattern>) -> PhrasePattern {
    let mut counts = [0usize; SLOTS_PER_PHRASE];
    let mut duration_sums = [0.0f64; SLOTS_PER_PHRASE];
    let mut duration_counts = [0usize; SLOTS_PER_PHRASE];
    let mut total = 0usize;

    for entry in entries {
        total += 1;
        for slot in 0..SLOTS_PER_PHRASE {
            if !entry.slots[slot] {
                continue;
            }
            counts[slot] += 1;
            if let Some(d) = entry.durations[slot] {
                duration_sums[slot] += d;
                duration_counts[slot] += 1;
            }
        }
    }

    let mut result = PhrasePattern::default();
    if total == 0 {
        return result;
    }

    for slot in 0..SLOTS_PER_PHRASE {
        let ratio = counts[slot] as f64 / total as f64;
        let majority = if is_eighth_beat(slot) {
            EIGHTH_BEAT_MAJORITY
        } else {
            OFFBEAT_MAJORITY
        };
        if counts[slot] > 0 && ratio >= majority {
            result.slots[slot] = true;
            if duration_counts[slot] > 0 {
                result.durations[slot] =
                    Some(duration_sums[slot] / duration_counts[slot] as f64);
            }
        }
    }
    result
}

/// Suppress off-grid slots adjacent (same beat) to an active 8th-beat slot
pub fn apply_eighth_beat_preference(pattern: &mut PhrasePattern) {
    let before = pattern.slots;
    for slot in 0..SLOTS_PER_PHRASE {
        if !before[slot] || is_eighth_beat(slot) {
            continue;
        }
        let beat = beat_of(slot);
        let neighbour_on_grid = [slot.checked_sub(1), Some(slot + 1)]
            .into_iter()
            .flatten()
            .filter(|&n| n < SLOTS_PER_PHRASE && beat_of(n) == beat)
            .any(|n| is_eighth_beat(n) && before[n]);
        if neighbour_on_grid {
            pattern.clear(slot);
        }
    }
}
