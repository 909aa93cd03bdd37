//! LLM-related error types.

use thiserror::Error;

/// Errors that can occur with LLM provider operations.
#[derive(Debug, Error)]
pub enum LlmError {
    /// API key/token not configured for the named provider.
    #[error("token not configured for {provider}")]
    TokenNotConfigured {
        /// Provider name.
        provider: String,
    },

    /// The factory was asked for a provider name it doesn't recognise.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// API request failed.
    #[error("API request failed: {0}")]
    ApiRequestFailed(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs} seconds")]
    RateLimitExceeded {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Invalid response from the API.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// Streaming error (connection dropped, malformed SSE frame, ...).
    #[error("streaming error: {0}")]
    StreamingError(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Provider configuration error (bad base URL, invalid header value, ...).
    #[error("configuration error: {0}")]
    ConfigError(String),
}

/// Result type for LLM provider operations.
pub type LlmResult<T> = Result<T, LlmError>;
