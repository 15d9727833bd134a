// Trace loading error types

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Trace error code constants
///
/// Error code range: 4001-4003
pub struct TraceErrorCodes {}

impl TraceErrorCodes {
    /// The trace file could not be read
    pub const READ_FAILED: i32 = 4001;

    /// The trace file is not valid trace JSON
    pub const PARSE_FAILED: i32 = 4002;

    /// The trace or synthetic spec violates an invariant
    pub const INVALID_TRACE: i32 = 4003;
}

/// Log a trace error with structured context
pub fn log_trace_error(err: &TraceError, context: &str) {
    error!(
        "Trace error in {}: code={}, component=SessionTrace, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised while loading or generating session traces
#[derive(Debug, Clone, PartialEq)]
pub enum TraceError {
    /// I/O failure reading a trace file
    ReadFailed { path: String, reason: String },

    /// JSON did not match the trace schema
    ParseFailed { reason: String },

    /// Events out of order, non-finite values, or an unusable synthetic spec
    InvalidTrace { reason: String },
}

impl ErrorCode for TraceError {
    fn code(&self) -> i32 {
        match self {
            TraceError::ReadFailed { .. } => TraceErrorCodes::READ_FAILED,
            TraceError::ParseFailed { .. } => TraceErrorCodes::PARSE_FAILED,
            TraceError::InvalidTrace { .. } => TraceErrorCodes::INVALID_TRACE,
        }
    }

    fn message(&self) -> String {
        match self {
            TraceError::ReadFailed { path, reason } => {
                format!("Failed to read trace {}: {}", path, reason)
            }
            TraceError::ParseFailed { reason } => format!("Invalid trace JSON: {}", reason),
            TraceError::InvalidTrace { reason } => format!("Invalid trace: {}", reason),
        }
    }
}

impl fmt::Display for TraceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TraceError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for TraceError {}

impl From<serde_json::Error> for TraceError {
    fn from(err: serde_json::Error) -> Self {
        TraceError::ParseFailed {
            reason: err.to_string(),
        }
    }
}
