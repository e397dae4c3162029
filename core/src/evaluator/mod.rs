//! Risk evaluator
//!
//! [`Evaluator`] is the single front every backend sits behind. It owns the
//! rule that a failed probe is always CRITICAL, so backends only ever see
//! captured plans.

pub mod extract;
pub mod heuristic;
pub mod model;
pub mod prompt;

pub use heuristic::HeuristicEvaluator;
pub use model::ModelEvaluator;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

use crate::completion::{
    ANTHROPIC_BASE_URL, AnthropicClient, ApiKey, CompletionClient, OPENROUTER_BASE_URL, OpenAiClient,
};
use crate::config::{EvaluatorBackend, EvaluatorConfig};
use crate::error::{GateError, Result};
use crate::profiler::{PlanOutcome, PlanResult};
use crate::statement::Statement;
use crate::verdict::RiskVerdict;

/// A scoring strategy for statements with a captured plan.
#[async_trait]
pub trait RiskEvaluator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn assess(&self, statement: &Statement, plan_lines: &[String], cancel: &CancellationToken) -> RiskVerdict;
}

/// Shared evaluator front.
#[derive(Clone)]
pub struct Evaluator {
    backend: Arc<dyn RiskEvaluator>,
    span: Span,
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl Evaluator {
    pub fn new(backend: Arc<dyn RiskEvaluator>, span: Span) -> Self {
        Self { backend, span }
    }

    pub fn heuristic(span: Span) -> Self {
        Self::new(Arc::new(HeuristicEvaluator::new()), span)
    }

    /// Build the configured backend.
    ///
    /// A missing API key is not an error here; it surfaces per statement as
    /// a provider fallback verdict.
    pub fn from_config(config: &EvaluatorConfig, span: Span) -> Result<Self> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let api_key = ApiKey::from_env(config.api_key_env.clone());
        let setup = |e: crate::completion::CompletionError| GateError::EvaluatorSetup(e.to_string());

        let client: Arc<dyn CompletionClient> = match config.backend {
            EvaluatorBackend::Heuristic => return Ok(Self::heuristic(span)),
            EvaluatorBackend::Openai => {
                let base_url = config.base_url.as_deref().unwrap_or(OPENROUTER_BASE_URL);
                Arc::new(OpenAiClient::new(base_url, api_key, timeout).map_err(setup)?)
            }
            EvaluatorBackend::Anthropic => {
                let base_url = config.base_url.as_deref().unwrap_or(ANTHROPIC_BASE_URL);
                Arc::new(AnthropicClient::new(base_url, api_key, timeout).map_err(setup)?)
            }
        };

        span.in_scope(|| {
            tracing::info!(
                backend = config.backend.as_str(),
                model = %config.model,
                "model-backed evaluator configured"
            );
        });

        let model = ModelEvaluator::new(
            client,
            config.model.clone(),
            config.temperature,
            config.max_tokens,
            config.retry.clone(),
        );
        Ok(Self::new(Arc::new(model), span))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Verdict for one profiled statement. Never fails.
    pub async fn evaluate(&self, plan: &PlanResult, cancel: &CancellationToken) -> RiskVerdict {
        match &plan.outcome {
            PlanOutcome::Failed(error) => RiskVerdict::execution_failure(error),
            PlanOutcome::Captured(lines) => {
                if cancel.is_cancelled() {
                    return RiskVerdict::cancelled();
                }
                self.backend
                    .assess(&plan.statement, lines, cancel)
                    .instrument(self.span.clone())
                    .await
                    .normalized()
            }
        }
    }

    /// Evaluate in input order with at most `concurrency` calls in flight.
    pub async fn evaluate_batch(
        &self,
        plans: &[PlanResult],
        concurrency: usize,
        cancel: &CancellationToken,
    ) -> Vec<RiskVerdict> {
        stream::iter(plans)
            .map(|plan| self.evaluate(plan, cancel))
            .buffered(concurrency.max(1))
            .collect::<Vec<_>>()
            .await
    }
}
