//! The unified error taxonomy (spec §7).
//!
//! Each crate boundary owns its own error type and converts into
//! [`ChorusError`] only where a caller needs one unified result — the
//! same discipline the teacher applies to `LlmError`/`StorageError`
//! converging at `SecurityError`.

use thiserror::Error;

/// Errors surfaced by the dispatcher and runtime to their callers.
#[derive(Debug, Error)]
pub enum ChorusError {
    /// Missing/invalid identifiers, empty content, negative ids on the wire.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown session, message, file, or user-mismatched id.
    #[error("not found: {0}")]
    NotFound(String),

    /// User mismatch or missing token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Provider-factory failure or missing credentials.
    #[error("resource error: {0}")]
    Resource(String),

    /// Chat/title/summary call failure (network, quota, model errors).
    #[error("provider error: {0}")]
    Provider(String),

    /// Admission deadline exceeded (Dispatcher intake was full).
    #[error("dispatcher busy")]
    DispatcherBusy,

    /// Caller context cancelled, or the per-turn deadline expired.
    #[error("cancelled")]
    Cancelled,

    /// Underlying store failure not classifiable above.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// An internal invariant was violated (poisoned lock, unreachable state).
    /// Never expected in correct operation; surfaced rather than panicking
    /// so one user's bug cannot take down another user's request.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ChorusError {
    /// Whether the HTTP layer should treat this as the user's fault (4xx)
    /// rather than the server's (5xx). Thin helper for the transport
    /// boundary described in spec §7; not itself part of the core model.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotFound(_) | Self::Unauthorized(_) | Self::DispatcherBusy
        )
    }
}

/// Result alias used throughout the dispatcher and runtime crates.
pub type ChorusResult<T> = Result<T, ChorusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_vs_server_classification() {
        assert!(ChorusError::Validation("x".into()).is_client_error());
        assert!(ChorusError::NotFound("x".into()).is_client_error());
        assert!(ChorusError::Unauthorized("x".into()).is_client_error());
        assert!(ChorusError::DispatcherBusy.is_client_error());
        assert!(!ChorusError::Provider("x".into()).is_client_error());
        assert!(!ChorusError::Persistence("x".into()).is_client_error());
        assert!(!ChorusError::Internal("x".into()).is_client_error());
        assert!(!ChorusError::Cancelled.is_client_error());
        assert!(!ChorusError::Resource("x".into()).is_client_error());
    }
}
