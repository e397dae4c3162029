//! Model-backed evaluator
//!
//! Per statement: prompt → completion (retried with backoff) → JSON salvage
//! → normalization. Every path ends in a verdict:
//!
//! | outcome                         | verdict                     |
//! |---------------------------------|-----------------------------|
//! | object recovered                | normalized model verdict    |
//! | no object in the text           | ACCEPTABLE / MEDIUM         |
//! | retries exhausted or permanent  | ACCEPTABLE / HIGH           |
//! | run cancelled                   | ACCEPTABLE / HIGH           |

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::RiskEvaluator;
use super::extract::extract_json_object;
use super::prompt::build_prompt;
use crate::completion::{CompletionClient, CompletionRequest};
use crate::retry::{RetryConfig, RetryError, RetryStatus, retry_with_backoff};
use crate::statement::Statement;
use crate::verdict::RiskVerdict;

pub struct ModelEvaluator {
    client: Arc<dyn CompletionClient>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    retry: RetryConfig,
}

impl ModelEvaluator {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        model: impl Into<String>,
        temperature: f32,
        max_tokens: u32,
        retry: RetryConfig,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
            max_tokens,
            retry,
        }
    }

    /// Decode a completion into a verdict; never fails.
    pub fn verdict_from_text(text: &str) -> RiskVerdict {
        match extract_json_object(text) {
            Ok((value, _)) => RiskVerdict::from_model_json(&value),
            Err(err) => {
                tracing::warn!("{err}");
                RiskVerdict::parse_fallback(&err.to_string())
            }
        }
    }
}

#[async_trait]
impl RiskEvaluator for ModelEvaluator {
    fn name(&self) -> &'static str {
        self.client.name()
    }

    async fn assess(&self, statement: &Statement, plan_lines: &[String], cancel: &CancellationToken) -> RiskVerdict {
        let request = CompletionRequest {
            prompt: build_prompt(statement, plan_lines),
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let outcome = retry_with_backoff(
            || self.client.complete(&request),
            &self.retry,
            cancel,
            |status: RetryStatus| {
                tracing::warn!(
                    attempt = status.attempt,
                    rate_limited = status.is_rate_limit,
                    "{}",
                    status.reason
                );
            },
        )
        .await;

        match outcome {
            Ok(text) => Self::verdict_from_text(&text),
            Err(RetryError::Aborted) => RiskVerdict::cancelled(),
            Err(err) => {
                tracing::error!(origin = statement.origin_path(), "evaluator backend failed: {err}");
                RiskVerdict::provider_fallback(&err.to_string())
            }
        }
    }
}
