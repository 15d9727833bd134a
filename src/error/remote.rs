// Remote predictor channel error types
//
// These errors never reach the prediction path: the session logs and drops
// them, since fresh data arrives on the next phrase anyway.

use crate::error::ErrorCode;
use log::debug;
use std::fmt;

/// Remote error code constants
///
/// Error code range: 5001-5002
pub struct RemoteErrorCodes {}

impl RemoteErrorCodes {
    /// Outbound queue is full
    pub const BACKPRESSURE: i32 = 5001;

    /// The remote endpoint was dropped
    pub const DISCONNECTED: i32 = 5002;
}

/// Log a remote error at debug level (best-effort channel)
pub fn log_remote_error(err: &RemoteError, context: &str) {
    debug!(
        "Remote error in {}: code={}, component=RemotePredictor, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Failures of the fire-and-forget remote predictor channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The outbound queue has no free slot
    Backpressure { capacity: usize },

    /// The receiving side no longer exists
    Disconnected,
}

impl ErrorCode for RemoteError {
    fn code(&self) -> i32 {
        match self {
            RemoteError::Backpressure { .. } => RemoteErrorCodes::BACKPRESSURE,
            RemoteError::Disconnected => RemoteErrorCodes::DISCONNECTED,
        }
    }

    fn message(&self) -> String {
        match self {
            RemoteError::Backpressure { capacity } => {
                format!("Remote queue full (capacity {})", capacity)
            }
            RemoteError::Disconnected => "Remote endpoint disconnected".to_string(),
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RemoteError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for RemoteError {}
