//! Error classification for retry decisions

use std::time::Duration;

/// Top-level error classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient errors that should be retried with backoff
    Retryable(RetryableError),

    /// Permanent errors that should NOT be retried
    Permanent(PermanentError),
}

/// Transient errors (retry recommended)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryableError {
    #[error("Request timed out")]
    Timeout,

    #[error("Rate limit exceeded (HTTP 429)")]
    RateLimitExceeded { retry_after_ms: Option<u64> },

    #[error("Service unavailable (HTTP {0})")]
    ServiceUnavailable(u16),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
}

/// Permanent errors (do NOT retry)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PermanentError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request rejected (HTTP {status}): {reason}")]
    RequestRejected { status: u16, reason: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Trait for error classification
pub trait RetryClassifiable {
    fn classify(&self) -> ErrorClass;

    fn is_retryable(&self) -> bool {
        matches!(self.classify(), ErrorClass::Retryable(_))
    }

    /// Server-provided delay that overrides the computed backoff.
    fn suggested_backoff(&self) -> Option<Duration> {
        match self.classify() {
            ErrorClass::Retryable(RetryableError::RateLimitExceeded {
                retry_after_ms: Some(ms),
            }) => Some(Duration::from_millis(ms)),
            _ => None,
        }
    }
}
