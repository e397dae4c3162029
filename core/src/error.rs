//! Error types for fatal gate failures
//!
//! Only boundary failures surface here: the statement batch cannot be read,
//! the report cannot be written, or the probe database cannot be reached.
//! Per-statement problems never become a `GateError`; they are folded into
//! the report as plan errors or fallback verdicts.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

/// Gate result type alias
pub type Result<T> = std::result::Result<T, GateError>;

/// Fatal error taxonomy
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read directory {path}: {source}")]
    DirectoryRead {
        path: PathBuf,
        source: walkdir::Error,
    },

    #[error("Failed to serialize JSON: {source}")]
    JsonSerialize { source: serde_json::Error },

    #[error("Failed to deserialize JSON from {path}: {source}")]
    JsonDeserialize {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Input not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Database connection failed: {0}")]
    DatabaseConnect(String),

    #[error("Unsupported database URL: {0}")]
    UnsupportedDatabase(String),

    #[error("Evaluator setup failed: {0}")]
    EvaluatorSetup(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
