//! Pipeline driver: profile → evaluate → decide
//!
//! Profiling runs one worker per probe connection; evaluation keeps at most
//! `concurrency` backend calls in flight. Both stages return results in the
//! order statements were discovered.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{Span, info_span};

use crate::config::SqlGateConfig;
use crate::error::Result;
use crate::evaluator::Evaluator;
use crate::gate::{GateDecision, GatePolicy, decide};
use crate::profiler::{ProbeConnection, Profiler};
use crate::report::{ReportRecord, build_records};
use crate::statement::Statement;

/// Reason appended to the decision of a cancelled run.
pub const CANCELLED_REASON: &str = "run cancelled before completion";

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub records: Vec<ReportRecord>,
    pub decision: GateDecision,
    pub cancelled: bool,
}

impl RunOutcome {
    pub fn approved(&self) -> bool {
        !self.decision.blocked
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    profiler: Profiler,
    evaluator: Evaluator,
    policy: GatePolicy,
    concurrency: usize,
    span: Span,
}

impl Pipeline {
    pub fn new(profiler: Profiler, evaluator: Evaluator, policy: GatePolicy, concurrency: usize, span: Span) -> Self {
        Self {
            profiler,
            evaluator,
            policy,
            concurrency: concurrency.max(1),
            span,
        }
    }

    /// Build every stage from configuration, each with a child span.
    pub fn from_config(config: &SqlGateConfig, span: Span) -> Result<Self> {
        let profiler = Profiler::new(
            Duration::from_millis(config.profiler.statement_timeout_ms),
            info_span!(parent: &span, "profiler"),
        );
        let evaluator = Evaluator::from_config(
            &config.evaluator,
            info_span!(parent: &span, "evaluator", backend = config.evaluator.backend.as_str()),
        )?;
        Ok(Self::new(
            profiler,
            evaluator,
            config.gate.clone(),
            config.pipeline.concurrency,
            span,
        ))
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub async fn run<C: ProbeConnection>(
        &self,
        statements: Vec<Statement>,
        connections: Vec<C>,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        let total = statements.len();
        self.span.in_scope(|| {
            tracing::info!(
                statements = total,
                connections = connections.len(),
                evaluator = self.evaluator.backend_name(),
                "starting gate run"
            );
        });

        let plans = self.profiler.profile_batch(statements, connections, cancel).await;
        let verdicts = self
            .evaluator
            .evaluate_batch(&plans, self.concurrency, cancel)
            .await;

        let mut decision = decide(&verdicts, &self.policy);
        let cancelled = cancel.is_cancelled();
        if cancelled {
            decision.blocked = true;
            decision.reasons.push(CANCELLED_REASON.to_string());
        }

        self.span.in_scope(|| {
            tracing::info!(
                blocked = decision.blocked,
                reasons = decision.reasons.len(),
                "gate decision reached"
            );
        });

        RunOutcome {
            records: build_records(&plans, verdicts),
            decision,
            cancelled,
        }
    }
}
