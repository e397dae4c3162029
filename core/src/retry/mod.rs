//! Retry logic with exponential backoff
//!
//! This module provides:
//! - Error classification (retryable vs permanent)
//! - Exponential backoff capped at a maximum delay, with optional jitter
//! - An attempt ceiling counting every call, the first one included
//! - Cancellation of both in-flight calls and backoff sleeps
//! - Status callbacks for progress reporting

pub mod classifier;
pub mod strategy;

pub use classifier::{ErrorClass, PermanentError, RetryClassifiable, RetryableError};
pub use strategy::{RetryConfig, RetryStatus, retry_with_backoff};

/// Retry module result type
pub type Result<T> = std::result::Result<T, RetryError>;

/// Retry error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryError {
    #[error("Max retry attempts exceeded after {attempts} attempt(s): {last_error}")]
    MaxAttemptsExceeded { attempts: usize, last_error: String },

    #[error("Permanent error (not retryable): {0}")]
    PermanentError(String),

    /// External cancellation requested
    #[error("Retry aborted by cancellation")]
    Aborted,
}
