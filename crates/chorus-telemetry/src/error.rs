//! Telemetry setup errors.

use thiserror::Error;

/// Errors from configuring or installing the global subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A directive or level string failed to parse.
    #[error("invalid logging configuration: {0}")]
    ConfigError(String),

    /// The global subscriber was already installed (e.g. a second call
    /// to `setup_logging` in the same process, common in test binaries
    /// that share a harness).
    #[error("failed to install subscriber: {0}")]
    InitError(String),
}

/// Result type for telemetry setup.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
