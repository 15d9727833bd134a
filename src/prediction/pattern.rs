//! Phrase slot patterns and bounded histories
//!
//! A phrase is 4 beats split into 32 slots (32nd-note resolution). Patterns
//! carry an optional duration per slot, in 32nd notes, which is only ever set
//! where the slot itself is active.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

pub const BEATS_PER_PHRASE: usize = 4;
pub const SLOTS_PER_BEAT: usize = 8;
pub const SLOTS_PER_PHRASE: usize = BEATS_PER_PHRASE * SLOTS_PER_BEAT;

/// Slots at multiples of this stride fall on 8th-note boundaries
pub const EIGHTH_BEAT_STRIDE: usize = 4;

/// Whether `slot` is aligned to an 8th-note boundary
pub fn is_eighth_beat(slot: usize) -> bool {
    slot % EIGHTH_BEAT_STRIDE == 0
}

/// Beat index (0..4) containing `slot`
pub fn beat_of(slot: usize) -> usize {
    slot / SLOTS_PER_BEAT
}

/// 32-slot onset pattern with per-slot durations
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PhrasePattern {
    pub slots: [bool; SLOTS_PER_PHRASE],
    pub durations: [Option<f64>; SLOTS_PER_PHRASE],
}

/// Predictions share the phrase layout
pub type Prediction = PhrasePattern;

impl PhrasePattern {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pattern with the given slots active; out-of-range indices are ignored
    pub fn from_active(active: &[usize]) -> Self {
        let mut pattern = Self::default();
        for &slot in active {
            pattern.set_active(slot);
        }
        pattern
    }

    pub fn is_active(&self, slot: usize) -> bool {
        self.slots.get(slot).copied().unwrap_or(false)
    }

    pub fn set_active(&mut self, slot: usize) {
        if let Some(s) = self.slots.get_mut(slot) {
            *s = true;
        }
    }

    /// Deactivate a slot, dropping its duration with it
    pub fn clear(&mut self, slot: usize) {
        if slot < SLOTS_PER_PHRASE {
            self.slots[slot] = false;
            self.durations[slot] = None;
        }
    }

    /// Attach a duration; refused (returns false) when the slot is inactive
    pub fn set_duration(&mut self, slot: usize, duration_32nd: f64) -> bool {
        if !self.is_active(slot) {
            return false;
        }
        self.durations[slot] = Some(duration_32nd);
        true
    }

    pub fn duration(&self, slot: usize) -> Option<f64> {
        if self.is_active(slot) {
            self.durations[slot]
        } else {
            None
        }
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|&&s| s).count()
    }

    pub fn is_silent(&self) -> bool {
        !self.slots.iter().any(|&s| s)
    }

    pub fn active_slots(&self) -> Vec<usize> {
        (0..SLOTS_PER_PHRASE).filter(|&i| self.slots[i]).collect()
    }

    /// Fraction of slots whose on/off state matches `other`
    pub fn similarity(&self, other: &PhrasePattern) -> f64 {
        let equal = self
            .slots
            .iter()
            .zip(other.slots.iter())
            .filter(|(a, b)| a == b)
            .count();
        equal as f64 / SLOTS_PER_PHRASE as f64
    }

    /// 0/1 encoding used on the wire
    pub fn to_bits(&self) -> Vec<u8> {
        self.slots.iter().map(|&s| u8::from(s)).collect()
    }
}

/// FIFO list that evicts its oldest entry once full
#[derive(Debug, Clone)]
pub struct BoundedHistory<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> BoundedHistory<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy of all entries, oldest first
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }

    /// Copy of the newest `n` entries, oldest first
    pub fn last_n(&self, n: usize) -> Vec<T> {
        let skip = self.items.len().saturating_sub(n);
        self.items.iter().skip(skip).cloned().collect()
    }

    /// Contiguous view for the predictors
    pub fn as_slice(&mut self) -> &[T] {
        self.items.make_contiguous()
    }
}
