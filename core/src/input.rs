//! Statement batch loading
//!
//! An input path is one of:
//! - a directory, walked recursively for `*.sql` files in sorted order
//! - a `.json` file holding pre-parsed `{query, type, file_path?, tables?}` entries
//! - any other file, read as SQL text

use std::path::Path;

use serde::Deserialize;
use walkdir::WalkDir;

use crate::classifier::{classify, referenced_tables};
use crate::error::{GateError, Result};
use crate::statement::{Statement, StatementKind};

/// Origin recorded for batch entries without a `file_path`.
pub const UNKNOWN_ORIGIN: &str = "unknown";

/// One entry of a pre-parsed batch.
#[derive(Debug, Deserialize)]
struct BatchEntry {
    query: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    file_path: Option<String>,
    #[serde(default)]
    tables: Option<Vec<String>>,
}

/// Load statements from a directory, a JSON batch, or a SQL file.
pub fn load(path: &Path) -> Result<Vec<Statement>> {
    if !path.exists() {
        return Err(GateError::InputNotFound(path.to_path_buf()));
    }
    if path.is_dir() {
        return discover(path);
    }
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        load_batch(path)
    } else {
        let text = read_sql_file(path)?;
        Ok(classify(&text, &path.display().to_string()))
    }
}

/// Walk `dir` for `.sql` files and classify each one.
pub fn discover(dir: &Path) -> Result<Vec<Statement>> {
    let mut statements = Vec::new();
    let mut files = 0usize;

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|source| GateError::DirectoryRead {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let is_sql = entry.file_type().is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("sql"));
        if !is_sql {
            continue;
        }

        files += 1;
        let text = read_sql_file(path)?;
        statements.extend(classify(&text, &path.display().to_string()));
    }

    tracing::info!(
        dir = %dir.display(),
        files,
        statements = statements.len(),
        "discovered SQL files"
    );
    Ok(statements)
}

/// Load a pre-parsed JSON batch.
pub fn load_batch(path: &Path) -> Result<Vec<Statement>> {
    let text = std::fs::read_to_string(path).map_err(|source| GateError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let entries: Vec<BatchEntry> =
        serde_json::from_str(&text).map_err(|source| GateError::JsonDeserialize {
            path: path.to_path_buf(),
            source,
        })?;

    let mut statements = Vec::with_capacity(entries.len());
    for entry in entries {
        let query = entry.query.trim();
        if query.is_empty() {
            tracing::warn!(path = %path.display(), "skipping batch entry with an empty query");
            continue;
        }
        let kind = match entry.kind.as_deref() {
            Some(kind) => StatementKind::parse_lenient(kind),
            None => classify(query, UNKNOWN_ORIGIN)
                .first()
                .map_or(StatementKind::Unknown, Statement::kind),
        };
        let tables = entry.tables.unwrap_or_else(|| referenced_tables(query));
        let origin = entry
            .file_path
            .filter(|origin| !origin.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_ORIGIN.to_string());
        statements.push(Statement::new(query, kind, origin, tables));
    }
    Ok(statements)
}

/// Read a SQL file, decoding invalid UTF-8 lossily.
fn read_sql_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|source| GateError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(err) => {
            tracing::warn!(path = %path.display(), "file is not valid UTF-8; decoding lossily");
            Ok(String::from_utf8_lossy(err.as_bytes()).into_owned())
        }
    }
}
