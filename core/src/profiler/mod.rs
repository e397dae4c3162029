//! Execution profiler
//!
//! Each statement is probed inside its own transaction:
//! `begin` → `explain` → `rollback`. The rollback is issued after every
//! successful or failed `begin`, so no probe ever commits. Failures are
//! captured per statement and never abort the batch.

mod postgres;
mod sqlite;

pub use postgres::PostgresProbe;
pub use sqlite::SqliteProbe;

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

use crate::classifier;
use crate::error::{GateError, Result};
use crate::statement::Statement;

/// Plan line recorded when a backend returns no rows.
pub const EMPTY_PLAN_PLACEHOLDER: &str = "(no plan rows returned)";

/// Error text for statements skipped by a cancelled run.
pub const CANCELLED: &str = "cancelled";

/// Database-side failures, folded into [`PlanOutcome::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("{0}")]
    Database(String),

    #[error("statement timed out after {0}ms")]
    Timeout(u64),

    #[error("refusing to probe text holding {0} statements")]
    MultiStatement(usize),

    #[error("rollback failed: {0}")]
    Rollback(String),
}

/// A connection able to run one statement inside an explicit transaction.
///
/// The profiler drives the sequence; implementations only translate each
/// primitive to their backend.
#[async_trait]
pub trait ProbeConnection: Send {
    fn backend(&self) -> &'static str;

    /// Open a transaction. `statement_timeout` may be enforced server-side.
    async fn begin(&mut self, statement_timeout: Duration) -> std::result::Result<(), ProbeError>;

    /// Plan rows for `sql`, run inside the open transaction.
    async fn explain(&mut self, sql: &str) -> std::result::Result<Vec<String>, ProbeError>;

    async fn rollback(&mut self) -> std::result::Result<(), ProbeError>;
}

/// Captured plan or execution error; never both, never neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    /// Non-empty plan output.
    Captured(Vec<String>),
    /// Raw error text from the probe.
    Failed(String),
}

/// Profiling result for one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanResult {
    pub statement: Statement,
    pub outcome: PlanOutcome,
}

impl PlanResult {
    pub fn captured(statement: Statement, mut lines: Vec<String>) -> Self {
        if lines.is_empty() {
            lines.push(EMPTY_PLAN_PLACEHOLDER.to_string());
        }
        Self {
            statement,
            outcome: PlanOutcome::Captured(lines),
        }
    }

    pub fn failed(statement: Statement, error: impl Into<String>) -> Self {
        Self {
            statement,
            outcome: PlanOutcome::Failed(error.into()),
        }
    }

    pub fn plan_lines(&self) -> Option<&[String]> {
        match &self.outcome {
            PlanOutcome::Captured(lines) => Some(lines),
            PlanOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            PlanOutcome::Captured(_) => None,
            PlanOutcome::Failed(error) => Some(error),
        }
    }
}

/// Runs probes with a per-statement timeout.
#[derive(Debug, Clone)]
pub struct Profiler {
    statement_timeout: Duration,
    span: Span,
}

impl Profiler {
    pub fn new(statement_timeout: Duration, span: Span) -> Self {
        Self {
            statement_timeout,
            span,
        }
    }

    /// Probe one statement. Never fails; errors become [`PlanOutcome::Failed`].
    pub async fn profile<C: ProbeConnection + ?Sized>(&self, statement: &Statement, conn: &mut C) -> PlanResult {
        self.probe(statement, conn)
            .instrument(self.span.clone())
            .await
    }

    async fn probe<C: ProbeConnection + ?Sized>(&self, statement: &Statement, conn: &mut C) -> PlanResult {
        let count = classifier::statement_count(statement.text());
        if count > 1 {
            let error = ProbeError::MultiStatement(count);
            tracing::warn!(origin = statement.origin_path(), "{error}");
            return PlanResult::failed(statement.clone(), error.to_string());
        }

        if let Err(err) = conn.begin(self.statement_timeout).await {
            if let Err(rollback_err) = conn.rollback().await {
                tracing::debug!("rollback after failed begin: {rollback_err}");
            }
            return PlanResult::failed(statement.clone(), err.to_string());
        }

        let timeout_ms = u64::try_from(self.statement_timeout.as_millis()).unwrap_or(u64::MAX);
        let explained = match tokio::time::timeout(self.statement_timeout, conn.explain(statement.text())).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(timeout_ms)),
        };

        let rolled_back = conn.rollback().await;

        match (explained, rolled_back) {
            (Ok(lines), Ok(())) => {
                tracing::debug!(
                    backend = conn.backend(),
                    kind = %statement.kind(),
                    rows = lines.len(),
                    "plan captured"
                );
                PlanResult::captured(statement.clone(), lines)
            }
            (Ok(_), Err(rollback_err)) => {
                tracing::error!("{}", ProbeError::Rollback(rollback_err.to_string()));
                PlanResult::failed(statement.clone(), ProbeError::Rollback(rollback_err.to_string()).to_string())
            }
            (Err(err), Ok(())) => {
                tracing::info!(origin = statement.origin_path(), "probe failed: {err}");
                PlanResult::failed(statement.clone(), err.to_string())
            }
            (Err(err), Err(rollback_err)) => {
                tracing::error!("{}", ProbeError::Rollback(rollback_err.to_string()));
                PlanResult::failed(
                    statement.clone(),
                    format!("{err}; {}", ProbeError::Rollback(rollback_err.to_string())),
                )
            }
        }
    }

    /// Probe a batch with one worker per connection.
    ///
    /// Results come back in input order. Once `cancel` fires, workers finish
    /// their current probe (rollback included) and every statement not yet
    /// probed is recorded as failed with [`CANCELLED`].
    pub async fn profile_batch<C: ProbeConnection>(
        &self,
        statements: Vec<Statement>,
        connections: Vec<C>,
        cancel: &CancellationToken,
    ) -> Vec<PlanResult> {
        let total = statements.len();
        let queue = Mutex::new(statements.into_iter().enumerate().collect::<VecDeque<_>>());

        let workers = connections.into_iter().map(|mut conn| {
            let queue = &queue;
            async move {
                let mut done = Vec::new();
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let Some((index, statement)) = queue.lock().await.pop_front() else {
                        break;
                    };
                    let result = self.profile(&statement, &mut conn).await;
                    done.push((index, result));
                }
                done
            }
        });

        let mut indexed: Vec<(usize, PlanResult)> = join_all(workers).await.into_iter().flatten().collect();

        let leftover = queue.into_inner();
        if !leftover.is_empty() {
            let reason = if cancel.is_cancelled() {
                CANCELLED
            } else {
                "no probe connection available"
            };
            self.span.in_scope(|| {
                tracing::warn!(skipped = leftover.len(), total, "statements not profiled: {reason}");
            });
            indexed.extend(
                leftover
                    .into_iter()
                    .map(|(index, statement)| (index, PlanResult::failed(statement, reason))),
            );
        }

        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, result)| result).collect()
    }
}

/// Probe connection for any supported backend.
pub enum AnyProbe {
    Postgres(PostgresProbe),
    Sqlite(SqliteProbe),
}

#[async_trait]
impl ProbeConnection for AnyProbe {
    fn backend(&self) -> &'static str {
        match self {
            AnyProbe::Postgres(conn) => conn.backend(),
            AnyProbe::Sqlite(conn) => conn.backend(),
        }
    }

    async fn begin(&mut self, statement_timeout: Duration) -> std::result::Result<(), ProbeError> {
        match self {
            AnyProbe::Postgres(conn) => conn.begin(statement_timeout).await,
            AnyProbe::Sqlite(conn) => conn.begin(statement_timeout).await,
        }
    }

    async fn explain(&mut self, sql: &str) -> std::result::Result<Vec<String>, ProbeError> {
        match self {
            AnyProbe::Postgres(conn) => conn.explain(sql).await,
            AnyProbe::Sqlite(conn) => conn.explain(sql).await,
        }
    }

    async fn rollback(&mut self) -> std::result::Result<(), ProbeError> {
        match self {
            AnyProbe::Postgres(conn) => conn.rollback().await,
            AnyProbe::Sqlite(conn) => conn.rollback().await,
        }
    }
}

/// Open `count` probe connections, choosing the backend by URL scheme.
pub async fn connect(url: &str, count: usize) -> Result<Vec<AnyProbe>> {
    let mut connections = Vec::with_capacity(count);
    for _ in 0..count.max(1) {
        let conn = if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            AnyProbe::Postgres(PostgresProbe::connect(url).await?)
        } else if url.starts_with("sqlite:") {
            AnyProbe::Sqlite(SqliteProbe::open(url)?)
        } else {
            return Err(GateError::UnsupportedDatabase(redact_url(url)));
        };
        connections.push(conn);
    }
    Ok(connections)
}

/// Hide the password part of a connection URL.
pub(crate) fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    match rest.split_once('@') {
        Some((userinfo, host)) => match userinfo.split_once(':') {
            Some((user, _)) => format!("{scheme}://{user}:***@{host}"),
            None => url.to_string(),
        },
        None => url.to_string(),
    }
}
