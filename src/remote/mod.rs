//! Optional remote predictor bridge
//!
//! After each completed phrase the session hands a [`RemotePayload`] to a
//! [`RemotePredictor`] without blocking. The remote side answers with an
//! averaged tempo, which comes back through [`RemotePredictor::poll_hint`]
//! and is blended in via the server BPM hint. Nothing here may stall or fail
//! local prediction: full or closed channels surface as [`RemoteError`] and
//! the caller drops them.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::RemoteError;

/// Phrase patterns and fragments sent per submission
pub const RECENT_PATTERNS: usize = 5;

/// Snapshot of local state shipped to the remote predictor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePayload {
    #[serde(rename = "currentBPM")]
    pub current_bpm: Option<f64>,
    /// Accepted per-interval BPM values (unsmoothed), oldest first
    pub bpm_history: Vec<f64>,
    /// Recent committed phrases as 32 0/1 slots
    pub recent_pulse_patterns: Vec<Vec<u8>>,
    /// Per-slot sustain lengths in 32nds for the same phrases, 0 where none
    pub recent_pulse_durations_slots: Vec<Vec<u32>>,
    pub recent_correct_prediction_parts: Vec<Vec<u8>>,
    pub hyper_prediction: Option<Vec<u8>>,
    /// Session time of the submission in milliseconds
    pub timestamp: f64,
}

/// Remote answer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteResponse {
    /// Averaged tempo across the remote's data
    pub bpm: Option<f64>,
}

/// Fire-and-forget link to a remote predictor
pub trait RemotePredictor: Send {
    /// Queue a payload without blocking
    fn submit(&mut self, payload: RemotePayload) -> Result<(), RemoteError>;

    /// Latest tempo hint received since the last poll
    fn poll_hint(&mut self) -> Option<f64>;
}

/// Session-side half of an in-process channel pair
pub struct ChannelRemote {
    outbound: mpsc::Sender<RemotePayload>,
    hints: mpsc::Receiver<f64>,
    capacity: usize,
}

/// Worker-side half: receives payloads and returns tempo hints
pub struct RemoteEndpoint {
    payloads: mpsc::Receiver<RemotePayload>,
    hints: mpsc::Sender<f64>,
}

/// Create a connected [`ChannelRemote`]/[`RemoteEndpoint`] pair
pub fn channel(capacity: usize) -> (ChannelRemote, RemoteEndpoint) {
    let capacity = capacity.max(1);
    let (payload_tx, payload_rx) = mpsc::channel(capacity);
    let (hint_tx, hint_rx) = mpsc::channel(capacity);
    (
        ChannelRemote {
            outbound: payload_tx,
            hints: hint_rx,
            capacity,
        },
        RemoteEndpoint {
            payloads: payload_rx,
            hints: hint_tx,
        },
    )
}

impl RemotePredictor for ChannelRemote {
    fn submit(&mut self, payload: RemotePayload) -> Result<(), RemoteError> {
        self.outbound.try_send(payload).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => RemoteError::Backpressure {
                capacity: self.capacity,
            },
            mpsc::error::TrySendError::Closed(_) => RemoteError::Disconnected,
        })
    }

    fn poll_hint(&mut self) -> Option<f64> {
        let mut latest = None;
        while let Ok(bpm) = self.hints.try_recv() {
            latest = Some(bpm);
        }
        latest
    }
}

impl RemoteEndpoint {
    /// Next submitted payload; `None` once the session side is gone
    pub async fn next_payload(&mut self) -> Option<RemotePayload> {
        self.payloads.recv().await
    }

    /// Non-async variant for synchronous workers and tests
    pub fn try_next_payload(&mut self) -> Option<RemotePayload> {
        self.payloads.try_recv().ok()
    }

    pub fn send_hint(&self, bpm: f64) -> Result<(), RemoteError> {
        self.hints.try_send(bpm).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => RemoteError::Backpressure {
                capacity: self.hints.max_capacity(),
            },
            mpsc::error::TrySendError::Closed(_) => RemoteError::Disconnected,
        })
    }

    /// Answer every payload with `respond` until the session side closes
    pub async fn serve<F>(mut self, mut respond: F)
    where
        F: FnMut(&RemotePayload) -> RemoteResponse,
    {
        while let Some(payload) = self.next_payload().await {
            let Some(bpm) = respond(&payload).bpm else {
                continue;
            };
            if let Err(err) = self.send_hint(bpm) {
                log::debug!("[Remote] Dropping hint {:.2}: {}", bpm, err);
                if err == RemoteError::Disconnected {
                    break;
                }
            }
        }
    }
}

/// Stand-in responder that answers with the mean of the submitted BPM history
pub fn average_tempo(payload: &RemotePayload) -> RemoteResponse {
    let valid: Vec<f64> = payload
        .bpm_history
        .iter()
        .copied()
        .filter(|b| b.is_finite() && *b > 0.0)
        .collect();
    let bpm = if valid.is_empty() {
        payload.current_bpm
    } else {
        Some(valid.iter().sum::<f64>() / valid.len() as f64)
    };
    RemoteResponse { bpm }
}
