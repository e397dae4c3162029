//! Risk verdict vocabulary
//!
//! A [`RiskVerdict`] is the structured assessment of one statement. Every
//! verdict that leaves the evaluator satisfies two invariants:
//!
//! - `evaluation` holds exactly one tier
//! - `issues` and `recommendations` are never empty
//!
//! Raw model output is decoded leniently through [`RiskVerdict::from_model_json`],
//! which restores both invariants.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Neutral issue used when an evaluator reports nothing.
pub const NO_ISSUES: &str = "No issues detected";

/// Neutral recommendation used when an evaluator suggests nothing.
pub const NO_RECOMMENDATIONS: &str = "No changes recommended";

/// Placeholder for an unknown execution time.
pub const UNKNOWN_TIME: &str = "unknown";

/// Separators that signal several tier names packed into one value.
const TIER_SEPARATORS: &[char] = &['|', '/', ','];

/// Overall evaluation of a statement, ordered from best to worst.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationTier {
    Good,
    Acceptable,
    NeedsImprovement,
    #[serde(alias = "CRITICAL_SECURITY")]
    Critical,
}

impl EvaluationTier {
    pub fn all() -> [Self; 4] {
        [
            Self::Good,
            Self::Acceptable,
            Self::NeedsImprovement,
            Self::Critical,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "GOOD",
            Self::Acceptable => "ACCEPTABLE",
            Self::NeedsImprovement => "NEEDS_IMPROVEMENT",
            Self::Critical => "CRITICAL",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "GOOD" => Some(Self::Good),
            "ACCEPTABLE" => Some(Self::Acceptable),
            "NEEDS_IMPROVEMENT" => Some(Self::NeedsImprovement),
            "CRITICAL" | "CRITICAL_SECURITY" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for EvaluationTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of the issues found.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeverityTier {
    Low,
    Medium,
    High,
    Critical,
}

impl SeverityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            "CRITICAL" | "CRITICAL_SECURITY" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of reading a tier field from raw evaluator output.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TierField<T> {
    Single(T),
    MultiValued(String),
    Unrecognized(String),
    Missing,
}

fn read_tier<T>(value: Option<&Value>, from_name: fn(&str) -> Option<T>) -> TierField<T> {
    let Some(raw) = value.and_then(Value::as_str) else {
        return TierField::Missing;
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return TierField::Missing;
    }
    if trimmed.contains(TIER_SEPARATORS) {
        return TierField::MultiValued(trimmed.to_string());
    }
    let name = trimmed.to_ascii_uppercase().replace([' ', '-'], "_");
    match from_name(&name) {
        Some(tier) => TierField::Single(tier),
        None => TierField::Unrecognized(trimmed.to_string()),
    }
}

/// Structured risk assessment for one statement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskVerdict {
    pub evaluation: EvaluationTier,
    pub severity: SeverityTier,
    #[serde(rename = "execution_time", alias = "estimated_time")]
    pub estimated_time: String,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

impl RiskVerdict {
    pub fn new(
        evaluation: EvaluationTier,
        severity: SeverityTier,
        estimated_time: impl Into<String>,
        issues: Vec<String>,
        recommendations: Vec<String>,
    ) -> Self {
        Self {
            evaluation,
            severity,
            estimated_time: estimated_time.into(),
            issues,
            recommendations,
        }
        .normalized()
    }

    /// Forced verdict for a statement whose probe failed.
    pub fn execution_failure(error: &str) -> Self {
        Self::new(
            EvaluationTier::Critical,
            SeverityTier::Critical,
            UNKNOWN_TIME,
            vec![format!("Execution error: {error}")],
            vec!["Fix the statement so it executes against the target schema".to_string()],
        )
    }

    /// Fallback when the evaluator response held no usable JSON object.
    pub fn parse_fallback(reason: &str) -> Self {
        Self::new(
            EvaluationTier::Acceptable,
            SeverityTier::Medium,
            UNKNOWN_TIME,
            vec![format!("Could not parse evaluator response: {reason}")],
            vec!["Review the statement manually".to_string()],
        )
    }

    /// Fallback when the evaluator backend could not be reached.
    pub fn provider_fallback(reason: &str) -> Self {
        Self::new(
            EvaluationTier::Acceptable,
            SeverityTier::High,
            UNKNOWN_TIME,
            vec![format!("Evaluator backend unavailable: {reason}")],
            vec!["Review the statement manually".to_string()],
        )
    }

    /// Fallback for a statement abandoned by a cancelled run.
    pub fn cancelled() -> Self {
        Self::provider_fallback("evaluation cancelled before completion")
    }

    /// Decode raw evaluator JSON, restoring the verdict invariants.
    pub fn from_model_json(value: &Value) -> Self {
        let mut issues = string_list(value.get("issues"));
        let recommendations = string_list(value.get("recommendations"));

        let evaluation = match read_tier(value.get("evaluation"), EvaluationTier::from_name) {
            TierField::Single(tier) => tier,
            TierField::MultiValued(raw) => {
                issues.push(format!(
                    "Evaluator returned multiple evaluation values ({raw}); treated as ACCEPTABLE"
                ));
                EvaluationTier::Acceptable
            }
            TierField::Unrecognized(raw) => {
                issues.push(format!(
                    "Evaluator returned unrecognized evaluation '{raw}'; treated as ACCEPTABLE"
                ));
                EvaluationTier::Acceptable
            }
            TierField::Missing => {
                issues.push("Evaluator response had no evaluation; treated as ACCEPTABLE".to_string());
                EvaluationTier::Acceptable
            }
        };

        let severity = match read_tier(value.get("severity"), SeverityTier::from_name) {
            TierField::Single(tier) => tier,
            _ => SeverityTier::Medium,
        };

        let estimated_time = value
            .get("execution_time")
            .or_else(|| value.get("estimated_time"))
            .and_then(|time| match time {
                Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
                Value::Number(number) => Some(number.to_string()),
                _ => None,
            })
            .unwrap_or_else(|| UNKNOWN_TIME.to_string());

        Self::new(evaluation, severity, estimated_time, issues, recommendations)
    }

    /// Fill empty issue and recommendation lists with neutral entries.
    pub fn normalized(mut self) -> Self {
        self.issues.retain(|issue| !issue.trim().is_empty());
        self.recommendations.retain(|rec| !rec.trim().is_empty());
        if self.issues.is_empty() {
            self.issues.push(NO_ISSUES.to_string());
        }
        if self.recommendations.is_empty() {
            self.recommendations.push(NO_RECOMMENDATIONS.to_string());
        }
        self
    }
}

/// Accept a list of strings or a single string; other values are stringified.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(Value::String(text)) => vec![text.clone()],
        _ => Vec::new(),
    }
}
