//! Engine event types published to telemetry subscribers and CLI reports.

use serde::{Deserialize, Serialize};

/// Why a remote submission did not go out
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    Backpressure,
    Disconnected,
}

/// Events emitted by a detection session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A non-silent phrase entered the history
    PhraseCommitted {
        started_at: f64,
        active_slots: usize,
    },
    /// A finished phrase was scored against the hyper-prediction
    PhraseEvaluated {
        started_at: f64,
        correct: usize,
        total: usize,
        accuracy: f64,
        false_positives: usize,
    },
    TempoChange {
        time: f64,
        bpm: f64,
    },
    EnergyLevelChanged {
        time: f64,
        from: u8,
        to: u8,
    },
    Reclustered {
        time: f64,
        centers: Vec<f64>,
    },
    RemoteDropped {
        reason: DropReason,
    },
}
