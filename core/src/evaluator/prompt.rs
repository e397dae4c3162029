//! Prompt construction for the model-backed evaluator

use crate::statement::Statement;

const NOT_AVAILABLE: &str = "N/A";

/// Render the analysis prompt for one statement and its captured plan.
pub fn build_prompt(statement: &Statement, plan_lines: &[String]) -> String {
    let plan = if plan_lines.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        plan_lines.join("\n")
    };
    let tables = if statement.tables().is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        statement.tables().join(", ")
    };

    format!(
        r#"Analyze the SQL statement and its EXPLAIN ANALYZE output.

Statement:
{query}

EXPLAIN ANALYZE output:
{plan}

Tables: {tables}
Statement type: {kind}

Rate it with exactly one evaluation:
- GOOD: efficient, fast, uses indexes
- ACCEPTABLE: works, but carries some risk
- NEEDS_IMPROVEMENT: slow, sequential scans, missing indexes
- CRITICAL: dangerous operation or very slow

Reply with a single JSON object and nothing else:
{{
  "evaluation": "one of GOOD, ACCEPTABLE, NEEDS_IMPROVEMENT, CRITICAL",
  "severity": "one of LOW, MEDIUM, HIGH, CRITICAL",
  "execution_time": "observed or estimated time",
  "issues": ["problems found"],
  "recommendations": ["suggested changes"]
}}
"#,
        query = statement.text(),
        kind = statement.kind(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::StatementKind;

    #[test]
    fn prompt_carries_statement_plan_tables_and_kind() {
        let statement = Statement::new(
            "SELECT * FROM orders o JOIN users u ON u.id = o.user_id",
            StatementKind::Select,
            "reports.sql",
            vec!["orders".to_string(), "users".to_string()],
        );
        let prompt = build_prompt(
            &statement,
            &["Hash Join".to_string(), "  -> Seq Scan on orders".to_string()],
        );
        assert!(prompt.contains("SELECT * FROM orders o JOIN users u"));
        assert!(prompt.contains("Hash Join\n  -> Seq Scan on orders"));
        assert!(prompt.contains("Tables: orders, users"));
        assert!(prompt.contains("Statement type: SELECT"));
    }

    #[test]
    fn missing_parts_render_as_not_available() {
        let statement = Statement::new("VACUUM", StatementKind::Unknown, "x.sql", Vec::new());
        let prompt = build_prompt(&statement, &[]);
        assert!(prompt.contains("Tables: N/A"));
        assert!(prompt.contains("EXPLAIN ANALYZE output:\nN/A"));
    }
}
