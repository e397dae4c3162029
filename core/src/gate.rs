//! Gate aggregator: folds verdicts into a pass/fail decision

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::verdict::{EvaluationTier, RiskVerdict};

/// Reason recorded for an empty batch.
pub const EMPTY_BATCH_REASON: &str = "no statements to evaluate";

/// Blocking thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatePolicy {
    /// Largest tolerated share of improvable verdicts; the gate blocks only
    /// when the share is strictly greater.
    #[serde(default = "default_max_improvable_fraction")]
    pub max_improvable_fraction: f64,

    /// Tiers counted as improvable.
    #[serde(default = "default_improvable_tiers")]
    pub improvable_tiers: Vec<EvaluationTier>,
}

fn default_max_improvable_fraction() -> f64 {
    0.6
}

fn default_improvable_tiers() -> Vec<EvaluationTier> {
    vec![EvaluationTier::NeedsImprovement, EvaluationTier::Critical]
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            max_improvable_fraction: default_max_improvable_fraction(),
            improvable_tiers: default_improvable_tiers(),
        }
    }
}

/// Outcome of one gate run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateDecision {
    pub total: usize,
    /// All four tiers, zero-filled.
    pub counts_by_evaluation: BTreeMap<EvaluationTier, usize>,
    pub improvable: usize,
    pub blocked: bool,
    pub reasons: Vec<String>,
}

impl GateDecision {
    pub fn count(&self, tier: EvaluationTier) -> usize {
        self.counts_by_evaluation.get(&tier).copied().unwrap_or(0)
    }

    pub fn improvable_fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.improvable as f64 / self.total as f64
        }
    }

    /// Console summary: totals, then blocking reasons or an approval line.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "SQL gate: {} statement(s) evaluated", self.total);
        for tier in EvaluationTier::all() {
            let _ = writeln!(out, "  {:<18} {}", tier.as_str(), self.count(tier));
        }
        let _ = writeln!(
            out,
            "  improvable: {}/{} ({:.1}%)",
            self.improvable,
            self.total,
            self.improvable_fraction() * 100.0
        );
        if self.blocked {
            let _ = writeln!(out, "BLOCKED:");
            for reason in &self.reasons {
                let _ = writeln!(out, "  - {reason}");
            }
        } else {
            let _ = writeln!(out, "APPROVED: no blocking conditions");
        }
        out
    }
}

/// Fold verdicts into a decision. Every rule is checked so the reasons are
/// complete; any one of them blocks.
pub fn decide(verdicts: &[RiskVerdict], policy: &GatePolicy) -> GateDecision {
    let mut counts: BTreeMap<EvaluationTier, usize> =
        EvaluationTier::all().into_iter().map(|tier| (tier, 0)).collect();
    for verdict in verdicts {
        *counts.entry(verdict.evaluation).or_insert(0) += 1;
    }

    let total = verdicts.len();
    let improvable = verdicts
        .iter()
        .filter(|verdict| policy.improvable_tiers.contains(&verdict.evaluation))
        .count();

    let mut reasons = Vec::new();
    if total == 0 {
        reasons.push(EMPTY_BATCH_REASON.to_string());
    } else {
        let critical = counts.get(&EvaluationTier::Critical).copied().unwrap_or(0);
        if critical > 0 {
            reasons.push(format!("{critical} statement(s) evaluated as CRITICAL"));
        }

        let fraction = improvable as f64 / total as f64;
        if fraction > policy.max_improvable_fraction {
            reasons.push(format!(
                "{improvable}/{total} statements ({:.1}%) need improvement, above the {:.1}% limit",
                fraction * 100.0,
                policy.max_improvable_fraction * 100.0
            ));
        }
    }

    GateDecision {
        total,
        counts_by_evaluation: counts,
        improvable,
        blocked: !reasons.is_empty(),
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::SeverityTier;
    use pretty_assertions::assert_eq;

    fn verdict(evaluation: EvaluationTier) -> RiskVerdict {
        RiskVerdict::new(evaluation, SeverityTier::Low, "unknown", Vec::new(), Vec::new())
    }

    fn batch(tiers: &[(EvaluationTier, usize)]) -> Vec<RiskVerdict> {
        tiers.iter()
            .flat_map(|(tier, n)| std::iter::repeat_n(*tier, *n))
            .map(verdict)
            .collect()
    }

    #[test]
    fn all_good_is_approved() {
        let decision = decide(&batch(&[(EvaluationTier::Good, 5)]), &GatePolicy::default());
        assert!(!decision.blocked);
        assert_eq!(decision.count(EvaluationTier::Good), 5);
        assert_eq!(decision.count(EvaluationTier::Critical), 0);
        assert!(decision.reasons.is_empty());
        assert_eq!(decision.counts_by_evaluation.len(), 4);
    }

    #[test]
    fn single_critical_blocks() {
        let verdicts = batch(&[(EvaluationTier::Good, 9), (EvaluationTier::Critical, 1)]);
        let decision = decide(&verdicts, &GatePolicy::default());
        assert!(decision.blocked);
        assert_eq!(decision.reasons, vec!["1 statement(s) evaluated as CRITICAL".to_string()]);
    }

    #[test]
    fn improvable_fraction_above_limit_blocks() {
        let verdicts = batch(&[
            (EvaluationTier::NeedsImprovement, 7),
            (EvaluationTier::Good, 3),
        ]);
        let decision = decide(&verdicts, &GatePolicy::default());
        assert!(decision.blocked);
        assert_eq!(decision.reasons.len(), 1);
        assert!(decision.reasons[0].starts_with("7/10 statements (70.0%)"));
    }

    #[test]
    fn fraction_equal_to_limit_passes() {
        let verdicts = batch(&[
            (EvaluationTier::NeedsImprovement, 6),
            (EvaluationTier::Acceptable, 4),
        ]);
        let decision = decide(&verdicts, &GatePolicy::default());
        assert!(!decision.blocked, "{:?}", decision.reasons);
    }

    #[test]
    fn empty_batch_blocks() {
        let decision = decide(&[], &GatePolicy::default());
        assert!(decision.blocked);
        assert_eq!(decision.total, 0);
        assert_eq!(decision.reasons, vec![EMPTY_BATCH_REASON.to_string()]);
    }

    #[test]
    fn all_triggered_reasons_are_listed() {
        let verdicts = batch(&[(EvaluationTier::Critical, 3), (EvaluationTier::Good, 1)]);
        let decision = decide(&verdicts, &GatePolicy::default());
        assert_eq!(decision.reasons.len(), 2);
        assert_eq!(decision.improvable, 3);
    }

    #[test]
    fn policy_is_configurable() {
        let policy = GatePolicy {
            max_improvable_fraction: 0.2,
            improvable_tiers: vec![EvaluationTier::NeedsImprovement],
        };
        let verdicts = batch(&[
            (EvaluationTier::NeedsImprovement, 3),
            (EvaluationTier::Good, 7),
        ]);
        assert!(decide(&verdicts, &policy).blocked);
        assert!(!decide(&verdicts, &GatePolicy::default()).blocked);
    }

    #[test]
    fn decide_is_idempotent() {
        let verdicts = batch(&[
            (EvaluationTier::Acceptable, 2),
            (EvaluationTier::NeedsImprovement, 5),
            (EvaluationTier::Critical, 1),
        ]);
        let policy = GatePolicy::default();
        assert_eq!(decide(&verdicts, &policy), decide(&verdicts, &policy));
    }

    #[test]
    fn summary_lists_reasons_or_approval() {
        let blocked = decide(&[], &GatePolicy::default());
        assert!(blocked.summary().contains("BLOCKED:\n  - no statements to evaluate"));

        let approved = decide(&batch(&[(EvaluationTier::Good, 2)]), &GatePolicy::default());
        let summary = approved.summary();
        assert!(summary.contains("improvable: 0/2 (0.0%)"));
        assert!(summary.contains("APPROVED"));
    }

    #[test]
    fn counts_serialize_with_tier_names() {
        let decision = decide(&batch(&[(EvaluationTier::Good, 1)]), &GatePolicy::default());
        let value = serde_json::to_value(&decision).unwrap();
        assert_eq!(value["counts_by_evaluation"]["GOOD"], 1);
        assert_eq!(value["counts_by_evaluation"]["CRITICAL"], 0);
    }
}
