//! Statement records produced by the classifier

use serde::{Deserialize, Serialize};

/// Statement kinds recognized by the classifier.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", from = "String")]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Drop,
    Alter,
    Truncate,
    Begin,
    Commit,
    Rollback,
    Unknown,
}

impl StatementKind {
    /// Kinds with a keyword, in the order prefix matching tries them.
    pub const KEYWORDS: [Self; 11] = [
        Self::Select,
        Self::Insert,
        Self::Update,
        Self::Delete,
        Self::Create,
        Self::Drop,
        Self::Alter,
        Self::Truncate,
        Self::Begin,
        Self::Commit,
        Self::Rollback,
    ];

    /// Upper-case keyword (`UNKNOWN` for [`StatementKind::Unknown`]).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Create => "CREATE",
            Self::Drop => "DROP",
            Self::Alter => "ALTER",
            Self::Truncate => "TRUNCATE",
            Self::Begin => "BEGIN",
            Self::Commit => "COMMIT",
            Self::Rollback => "ROLLBACK",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Exact keyword match (case-insensitive). `None` for anything else.
    pub fn from_keyword(word: &str) -> Option<Self> {
        Self::KEYWORDS
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(word))
    }

    /// Lenient parse used for pre-parsed batches: `WITH` maps to SELECT,
    /// `START TRANSACTION` to BEGIN, anything unrecognized to UNKNOWN.
    pub fn parse_lenient(value: &str) -> Self {
        let upper = value.trim().to_ascii_uppercase();
        match upper.as_str() {
            "WITH" => Self::Select,
            "START TRANSACTION" => Self::Begin,
            other => Self::from_keyword(other).unwrap_or(Self::Unknown),
        }
    }
}

impl From<String> for StatementKind {
    fn from(value: String) -> Self {
        Self::parse_lenient(&value)
    }
}

impl std::fmt::Display for StatementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified, comment-stripped unit of SQL text.
///
/// Built once by the classifier (or from a pre-parsed batch entry) and never
/// mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Statement {
    #[serde(rename = "query")]
    text: String,
    #[serde(rename = "type")]
    kind: StatementKind,
    #[serde(rename = "file_path")]
    origin_path: String,
    tables: Vec<String>,
}

impl Statement {
    pub fn new(
        text: impl Into<String>,
        kind: StatementKind,
        origin_path: impl Into<String>,
        tables: Vec<String>,
    ) -> Self {
        Self {
            text: text.into(),
            kind,
            origin_path: origin_path.into(),
            tables,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn origin_path(&self) -> &str {
        &self.origin_path
    }

    /// Referenced table names, in order of first appearance.
    pub fn tables(&self) -> &[String] {
        &self.tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn keyword_lookup_is_case_insensitive() {
        assert_eq!(StatementKind::from_keyword("select"), Some(StatementKind::Select));
        assert_eq!(StatementKind::from_keyword("TrUnCaTe"), Some(StatementKind::Truncate));
        assert_eq!(StatementKind::from_keyword("WITH"), None);
        assert_eq!(StatementKind::from_keyword("UNKNOWN"), None);
    }

    #[test]
    fn lenient_parse_maps_batch_types() {
        assert_eq!(StatementKind::parse_lenient("WITH"), StatementKind::Select);
        assert_eq!(StatementKind::parse_lenient(" delete "), StatementKind::Delete);
        assert_eq!(StatementKind::parse_lenient("EXPLAIN"), StatementKind::Unknown);
        assert_eq!(StatementKind::parse_lenient(""), StatementKind::Unknown);
    }

    #[test]
    fn kind_serializes_upper_case() {
        let json = serde_json::to_string(&StatementKind::Rollback).unwrap();
        assert_eq!(json, "\"ROLLBACK\"");
        let back: StatementKind = serde_json::from_str("\"with\"").unwrap();
        assert_eq!(back, StatementKind::Select);
    }
}
