use crate::config::error::{ConfigError, Result};
use crate::gate::GatePolicy;
use crate::retry::RetryConfig;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use urlencoding::encode;

/// Environment prefix for configuration overrides.
pub const ENV_PREFIX: &str = "SQLGATE";

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SqlGateConfig {
    #[serde(default)]
    pub evaluator: EvaluatorConfig,

    #[serde(default)]
    pub profiler: ProfilerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub gate: GatePolicy,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Which evaluator scores statements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluatorBackend {
    /// Local deterministic rules
    #[default]
    Heuristic,
    /// OpenAI-compatible `/chat/completions` (OpenRouter, OpenAI, Ollama)
    Openai,
    /// Anthropic Messages API
    Anthropic,
}

impl EvaluatorBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heuristic => "heuristic",
            Self::Openai => "openai",
            Self::Anthropic => "anthropic",
        }
    }
}

impl std::str::FromStr for EvaluatorBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "heuristic" => Ok(Self::Heuristic),
            "openai" => Ok(Self::Openai),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(ConfigError::ValidationError(format!(
                "unknown evaluator backend '{other}' (expected heuristic, openai or anthropic)"
            ))),
        }
    }
}

/// Evaluator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    #[serde(default)]
    pub backend: EvaluatorBackend,

    /// Model identifier sent to the completion backend
    #[serde(default = "default_model")]
    pub model: String,

    /// API base URL (backend default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Environment variable holding the API key; empty for keyless backends
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub retry: RetryConfig,
}

/// Profiler settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilerConfig {
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
}

/// Probe database settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Pipeline settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Probe connections and in-flight evaluations
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

// Default value functions
fn default_model() -> String {
    "mistralai/mistral-7b-instruct:free".to_string()
}
fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    400
}
fn default_request_timeout_ms() -> u64 {
    60_000
}
fn default_statement_timeout_ms() -> u64 {
    30_000
}
fn default_concurrency() -> usize {
    4
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            backend: EvaluatorBackend::default(),
            model: default_model(),
            base_url: None,
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_ms: default_request_timeout_ms(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            statement_timeout_ms: default_statement_timeout_ms(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

impl DatabaseConfig {
    /// Resolve the probe database URL from the process environment.
    pub fn resolve_url(&self) -> Option<String> {
        self.resolve_url_with(|name| std::env::var(name).ok())
    }

    /// Resolution order: `database.url`, `DATABASE_URL`, then a PostgreSQL
    /// URL assembled from `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER` and
    /// `DB_PASSWORD` (needs at least `DB_NAME` or `DB_USER`).
    pub fn resolve_url_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(url) = self.url.as_ref().filter(|url| !url.trim().is_empty()) {
            return Some(url.clone());
        }
        if let Some(url) = non_empty("DATABASE_URL") {
            return Some(url);
        }

        let name = non_empty("DB_NAME");
        let user = non_empty("DB_USER");
        if name.is_none() && user.is_none() {
            return None;
        }

        let host = non_empty("DB_HOST").unwrap_or_else(|| "db".to_string());
        let port = non_empty("DB_PORT").unwrap_or_else(|| "5432".to_string());
        let userinfo = match (user, non_empty("DB_PASSWORD")) {
            (Some(user), Some(password)) => format!("{}:{}@", encode(&user), encode(&password)),
            (Some(user), None) => format!("{}@", encode(&user)),
            (None, _) => String::new(),
        };
        let name = name.unwrap_or_default();
        Some(format!("postgres://{userinfo}{host}:{port}/{}", encode(&name)))
    }
}

/// Configuration loader with layered merging support
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new ConfigLoader
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration with layered merging:
    /// 1. Start with defaults (from Default implementations)
    /// 2. Merge config file if provided
    /// 3. Override with environment variables (SQLGATE_ prefix)
    pub fn load(&self) -> Result<SqlGateConfig> {
        let mut builder = Config::builder();

        // Layer 1: Defaults serialized to JSON as the base source
        let defaults_json = serde_json::to_string(&SqlGateConfig::default())?;
        builder = builder.add_source(File::from_str(&defaults_json, config::FileFormat::Json));

        // Layer 2: Config file (if provided)
        if let Some(ref path) = self.config_path {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_ref()));
            } else {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
        }

        // Layer 3: Environment variables, e.g. SQLGATE_GATE__MAX_IMPROVABLE_FRACTION=0.5
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("gate.improvable_tiers"),
        );

        let config: SqlGateConfig = builder.build()?.try_deserialize()?;
        super::validate(&config)?;
        Ok(config)
    }

    /// Locate the default config file in standard locations:
    /// 1. Current directory: ./sqlgate.toml
    /// 2. Config dir: <config_dir>/sqlgate/config.toml
    /// 3. Home directory: ~/.sqlgate.toml
    pub fn find_config_file() -> Option<PathBuf> {
        let cwd_config = PathBuf::from("./sqlgate.toml");
        if cwd_config.exists() {
            return Some(cwd_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("sqlgate").join("config.toml");
            if xdg_config.exists() {
                return Some(xdg_config);
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            let home_config = home_dir.join(".sqlgate.toml");
            if home_config.exists() {
                return Some(home_config);
            }
        }

        None
    }

    /// Load configuration from default locations
    pub fn load_default() -> Result<SqlGateConfig> {
        let loader = match Self::find_config_file() {
            Some(config_path) => ConfigLoader::new().with_file(config_path),
            None => ConfigLoader::new(),
        };
        loader.load()
    }
}
