//! Text-completion clients for the model-backed evaluator
//!
//! Two HTTP backends share one request/response contract:
//! - [`OpenAiClient`]: OpenAI-compatible `/chat/completions` (OpenRouter,
//!   OpenAI, local Ollama)
//! - [`AnthropicClient`]: Anthropic Messages API
//!
//! Errors are classified for the retry engine through
//! [`RetryClassifiable`]: transport failures, timeouts, HTTP 429 and 5xx are
//! retryable; everything else is permanent.

mod anthropic;
mod openai;

pub use anthropic::{AnthropicClient, DEFAULT_BASE_URL as ANTHROPIC_BASE_URL};
pub use openai::{DEFAULT_BASE_URL as OPENROUTER_BASE_URL, OpenAiClient};

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use serde::Deserialize;
use thiserror::Error;

use crate::retry::{ErrorClass, PermanentError, RetryClassifiable, RetryableError};

/// One completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Errors from completion backends.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Network request failed.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Provider returned an error response.
    #[error("API error ({status}): {message}")]
    ApiResponse {
        status: u16,
        message: String,
        /// Delay requested through `Retry-After`, if any.
        retry_after_ms: Option<u64>,
    },

    /// Response envelope did not have the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The API key environment variable is unset or empty.
    #[error("API key not set (expected in ${0})")]
    MissingApiKey(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for completion operations.
pub type CompletionResult<T> = Result<T, CompletionError>;

impl RetryClassifiable for CompletionError {
    fn classify(&self) -> ErrorClass {
        match self {
            CompletionError::Network(err) if err.is_timeout() => {
                ErrorClass::Retryable(RetryableError::Timeout)
            }
            CompletionError::Network(err) => {
                ErrorClass::Retryable(RetryableError::ConnectionFailed(err.to_string()))
            }
            CompletionError::ApiResponse {
                status: 429,
                retry_after_ms,
                ..
            } => ErrorClass::Retryable(RetryableError::RateLimitExceeded {
                retry_after_ms: *retry_after_ms,
            }),
            CompletionError::ApiResponse { status, .. } if *status >= 500 => {
                ErrorClass::Retryable(RetryableError::ServiceUnavailable(*status))
            }
            CompletionError::ApiResponse {
                status: status @ (401 | 403),
                message,
                ..
            } => ErrorClass::Permanent(PermanentError::AuthenticationFailed(format!(
                "HTTP {status}: {message}"
            ))),
            CompletionError::ApiResponse {
                status, message, ..
            } => ErrorClass::Permanent(PermanentError::RequestRejected {
                status: *status,
                reason: message.clone(),
            }),
            CompletionError::Parse(msg) => {
                ErrorClass::Permanent(PermanentError::MalformedResponse(msg.clone()))
            }
            CompletionError::MissingApiKey(var) => {
                ErrorClass::Permanent(PermanentError::MissingCredentials(var.clone()))
            }
            CompletionError::InvalidConfig(msg) => {
                ErrorClass::Permanent(PermanentError::InvalidConfig(msg.clone()))
            }
        }
    }
}

/// A backend that turns a prompt into free text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    async fn complete(&self, request: &CompletionRequest) -> CompletionResult<String>;
}

/// API key resolved from an environment variable.
///
/// An empty variable name means the backend needs no key (local Ollama).
#[derive(Clone)]
pub struct ApiKey {
    env_var: String,
    value: Option<String>,
}

impl ApiKey {
    pub fn from_env(env_var: impl Into<String>) -> Self {
        let env_var = env_var.into();
        let value = if env_var.is_empty() {
            None
        } else {
            std::env::var(&env_var)
                .ok()
                .filter(|value| !value.trim().is_empty())
        };
        Self { env_var, value }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            env_var: "<literal>".to_string(),
            value: Some(value.into()),
        }
    }

    pub fn none() -> Self {
        Self {
            env_var: String::new(),
            value: None,
        }
    }

    /// `Ok(None)` when no key is needed.
    fn resolve(&self) -> CompletionResult<Option<&str>> {
        match (&self.value, self.env_var.is_empty()) {
            (Some(value), _) => Ok(Some(value.as_str())),
            (None, true) => Ok(None),
            (None, false) => Err(CompletionError::MissingApiKey(self.env_var.clone())),
        }
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey")
            .field("env_var", &self.env_var)
            .field("value", &self.value.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Build a reqwest client with a whole-request timeout.
pub(crate) fn http_client(timeout: Duration) -> CompletionResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| CompletionError::InvalidConfig(format!("Failed to build HTTP client: {e}")))
}

/// Provider error envelope shared by OpenAI-compatible and Anthropic APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Turn a non-success response into [`CompletionError::ApiResponse`].
pub(crate) async fn error_from_response(response: reqwest::Response) -> CompletionError {
    let status = response.status().as_u16();
    let retry_after_ms = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_retry_after);
    let text = response.text().await.unwrap_or_default();

    let message = match serde_json::from_str::<ErrorEnvelope>(&text) {
        Ok(envelope) => envelope.error.message,
        Err(_) => text,
    };

    CompletionError::ApiResponse {
        status,
        message,
        retry_after_ms,
    }
}

/// `Retry-After` in delta-seconds (fractional values accepted).
fn parse_retry_after(value: &str) -> Option<u64> {
    let seconds: f64 = value.trim().parse().ok()?;
    if seconds.is_finite() && seconds >= 0.0 {
        Some((seconds * 1000.0) as u64)
    } else {
        None
    }
}

/// Join a base URL and a path without doubling the slash.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}
