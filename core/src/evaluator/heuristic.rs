//! Local rule-based evaluator
//!
//! Deterministic and offline. Rules run in order; the first match wins:
//! 1. `DROP` or `TRUNCATE` anywhere in the text
//! 2. `DELETE` with no `WHERE`
//! 3. SELECT
//! 4. INSERT / UPDATE
//! 5. anything else

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::RiskEvaluator;
use crate::statement::{Statement, StatementKind};
use crate::verdict::{EvaluationTier, RiskVerdict, SeverityTier, UNKNOWN_TIME};

const EXECUTION_TIME_MARKER: &str = "Execution Time:";

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEvaluator;

impl HeuristicEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Score a statement whose plan was captured.
    pub fn score(&self, statement: &Statement, plan_lines: &[String]) -> RiskVerdict {
        let upper = statement.text().to_ascii_uppercase();
        let time = execution_time(plan_lines);

        if upper.contains("DROP") || upper.contains("TRUNCATE") {
            return RiskVerdict::new(
                EvaluationTier::Critical,
                SeverityTier::Critical,
                time,
                vec!["Dangerous destructive operation".to_string()],
                vec!["Remove the statement or run it through a reviewed migration".to_string()],
            );
        }

        if upper.contains("DELETE") && !upper.contains("WHERE") {
            return RiskVerdict::new(
                EvaluationTier::Critical,
                SeverityTier::Critical,
                time,
                vec!["DELETE without WHERE clause".to_string()],
                vec!["Add a WHERE clause limiting the rows deleted".to_string()],
            );
        }

        match statement.kind() {
            StatementKind::Select => RiskVerdict::new(
                EvaluationTier::Good,
                SeverityTier::Low,
                time,
                Vec::new(),
                Vec::new(),
            ),
            StatementKind::Insert | StatementKind::Update => RiskVerdict::new(
                EvaluationTier::NeedsImprovement,
                SeverityTier::Medium,
                time,
                vec![format!("{} modifies data", statement.kind())],
                vec!["Batch writes where possible and make sure filtered columns are indexed".to_string()],
            ),
            _ => RiskVerdict::new(
                EvaluationTier::Acceptable,
                SeverityTier::Low,
                time,
                Vec::new(),
                Vec::new(),
            ),
        }
    }
}

#[async_trait]
impl RiskEvaluator for HeuristicEvaluator {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn assess(&self, statement: &Statement, plan_lines: &[String], _cancel: &CancellationToken) -> RiskVerdict {
        self.score(statement, plan_lines)
    }
}

/// Value of the `Execution Time:` plan line, if present.
fn execution_time(plan_lines: &[String]) -> String {
    plan_lines
        .iter()
        .find_map(|line| {
            line.trim()
                .strip_prefix(EXECUTION_TIME_MARKER)
                .map(|rest| rest.trim().to_string())
        })
        .filter(|time| !time.is_empty())
        .unwrap_or_else(|| UNKNOWN_TIME.to_string())
}
