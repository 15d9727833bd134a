// Configuration error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Configuration error code constants
///
/// Error code range: 3001-3003
pub struct ConfigErrorCodes {}

impl ConfigErrorCodes {
    /// A smoothing factor is outside (0, 1]
    pub const INVALID_SMOOTHING: i32 = 3001;

    /// A BPM range is empty or non-positive
    pub const INVALID_BPM_RANGE: i32 = 3002;

    /// A bounded buffer was configured with zero capacity
    pub const ZERO_CAPACITY: i32 = 3003;
}

/// Log a configuration error with structured context
pub fn log_config_error(err: &ConfigError, context: &str) {
    error!(
        "Config error in {}: code={}, component=EngineConfig, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Exponential smoothing factor must be in (0, 1]
    InvalidSmoothing { field: &'static str, value: f64 },

    /// BPM bounds must satisfy 0 < min < max
    InvalidBpmRange { min: f64, max: f64 },

    /// Capacity of a bounded list must be at least 1
    ZeroCapacity { field: &'static str },
}

impl ErrorCode for ConfigError {
    fn code(&self) -> i32 {
        match self {
            ConfigError::InvalidSmoothing { .. } => ConfigErrorCodes::INVALID_SMOOTHING,
            ConfigError::InvalidBpmRange { .. } => ConfigErrorCodes::INVALID_BPM_RANGE,
            ConfigError::ZeroCapacity { .. } => ConfigErrorCodes::ZERO_CAPACITY,
        }
    }

    fn message(&self) -> String {
        match self {
            ConfigError::InvalidSmoothing { field, value } => {
                format!("{} must be in (0, 1] (got {})", field, value)
            }
            ConfigError::InvalidBpmRange { min, max } => {
                format!("BPM range must satisfy 0 < min < max (got {}..{})", min, max)
            }
            ConfigError::ZeroCapacity { field } => {
                format!("{} must be at least 1", field)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConfigError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ConfigError {}
