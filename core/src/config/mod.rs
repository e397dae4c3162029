//! Configuration module for sqlgate
//!
//! Layered configuration:
//! 1. Defaults (from code)
//! 2. Config file (sqlgate.toml)
//! 3. Environment variables (SQLGATE_* prefix, `__` for nesting)
//!
//! # Example
//!
//! ```no_run
//! use sqlgate_core::config::ConfigLoader;
//!
//! // Load from default locations
//! let config = ConfigLoader::load_default().expect("Failed to load config");
//!
//! // Or load from specific file
//! let config = ConfigLoader::new()
//!     .with_file("./ci/sqlgate.toml")
//!     .load()
//!     .expect("Failed to load config");
//! ```

pub mod error;
pub mod loader;
pub mod validator;

pub use error::{ConfigError, Result};
pub use loader::{
    ConfigLoader, DatabaseConfig, EvaluatorBackend, EvaluatorConfig, PipelineConfig,
    ProfilerConfig, SqlGateConfig,
};
pub use validator::validate;
