// Error types for the rhythm engine
//
// Normal operation never fails: "not enough data" is reported through `None`
// and level-0 sentinels. The types here cover the few fallible surfaces:
// configuration validation, trace loading, and the optional remote channel.

mod config;
mod remote;
mod trace;

pub use config::{log_config_error, ConfigError, ConfigErrorCodes};
pub use remote::{log_remote_error, RemoteError, RemoteErrorCodes};
pub use trace::{log_trace_error, TraceError, TraceErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, so the CLI and logs report them uniformly.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
