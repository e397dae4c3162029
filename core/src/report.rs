//! Per-statement JSON report

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};
use crate::profiler::PlanResult;
use crate::statement::StatementKind;
use crate::verdict::RiskVerdict;

/// One report entry, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub query: String,
    #[serde(rename = "type")]
    pub kind: StatementKind,
    pub tables: Vec<String>,
    pub file_path: String,
    pub analysis: RiskVerdict,
}

impl ReportRecord {
    pub fn new(plan: &PlanResult, analysis: RiskVerdict) -> Self {
        let statement = &plan.statement;
        Self {
            query: statement.text().to_string(),
            kind: statement.kind(),
            tables: statement.tables().to_vec(),
            file_path: statement.origin_path().to_string(),
            analysis,
        }
    }
}

/// Pair plans with their verdicts, position by position.
pub fn build_records(plans: &[PlanResult], verdicts: Vec<RiskVerdict>) -> Vec<ReportRecord> {
    plans
        .iter()
        .zip(verdicts)
        .map(|(plan, verdict)| ReportRecord::new(plan, verdict))
        .collect()
}

/// Write the report as pretty-printed JSON, creating parent directories.
pub fn write_report(path: &Path, records: &[ReportRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(records).map_err(|source| GateError::JsonSerialize { source })?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| GateError::FileWrite {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    std::fs::write(path, json).map_err(|source| GateError::FileWrite {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), records = records.len(), "report written");
    Ok(())
}
