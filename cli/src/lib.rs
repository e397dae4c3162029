//! SQL gate CLI
//!
//! Loads a statement batch, probes every statement against a database inside
//! a rolled-back transaction, scores it, writes the per-statement report and
//! turns the gate decision into a process exit status.
//!
//! ## Exit Codes
//!
//! - 0: Approved
//! - 1: Blocked (or cancelled)
//! - 3: Infrastructure error (input, report, configuration, database)

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use owo_colors::OwoColorize;
use sqlgate_core::config::{ConfigLoader, EvaluatorBackend, SqlGateConfig, validate};
use sqlgate_core::{Pipeline, RunOutcome, input, profiler, report};
use tokio_util::sync::CancellationToken;
use tracing::info_span;

pub const EXIT_APPROVED: u8 = 0;
pub const EXIT_BLOCKED: u8 = 1;
pub const EXIT_INFRASTRUCTURE: u8 = 3;

/// Pre-deployment risk gate for SQL statements
#[derive(Debug, Parser)]
#[command(name = "sqlgate", version)]
pub struct GateCli {
    /// SQL file, directory searched for *.sql files, or JSON batch
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Where to write the per-statement JSON report
    #[arg(long = "report", short = 'r', value_name = "PATH", default_value = "llm_report.json")]
    pub report: PathBuf,

    /// TOML configuration file (defaults to the standard locations)
    #[arg(long = "config", short = 'c', value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Evaluator backend (heuristic, openai, anthropic)
    #[arg(long = "evaluator", short = 'e', value_name = "BACKEND")]
    pub evaluator: Option<EvaluatorBackend>,

    /// Probe database URL (postgres://... or sqlite:...)
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Probe connections and in-flight evaluator calls
    #[arg(long = "concurrency", short = 'j', value_name = "N")]
    pub concurrency: Option<usize>,

    /// Also print the gate decision as JSON on stdout (the text summary moves to stderr)
    #[arg(long = "json")]
    pub json: bool,
}

impl GateCli {
    /// Run the gate; errors are infrastructure failures.
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        let config = self.load_config()?;

        let statements = input::load(&self.input)?;
        let connections = if statements.is_empty() {
            tracing::warn!(input = %self.input.display(), "no statements found; skipping probe database");
            Vec::new()
        } else {
            let url = config.database.resolve_url().context(
                "no probe database configured: pass --database-url, set database.url, DATABASE_URL or DB_NAME",
            )?;
            profiler::connect(&url, config.pipeline.concurrency).await?
        };

        let span = info_span!("gate_run", input = %self.input.display());
        let pipeline = Pipeline::from_config(&config, span)?;

        let cancel = CancellationToken::new();
        let interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling run");
                interrupt.cancel();
            }
        });

        let outcome = pipeline.run(statements, connections, &cancel).await;
        report::write_report(&self.report, &outcome.records)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&outcome.decision)?);
            print_summary(&outcome, Console::Stderr);
        } else {
            print_summary(&outcome, Console::Stdout);
        }

        Ok(ExitCode::from(exit_code(&outcome)))
    }

    /// Layered configuration with command-line overrides applied last.
    fn load_config(&self) -> anyhow::Result<SqlGateConfig> {
        let loader = match self.config.clone().or_else(ConfigLoader::find_config_file) {
            Some(path) => ConfigLoader::new().with_file(path),
            None => ConfigLoader::new(),
        };
        let mut config = loader.load().context("failed to load configuration")?;

        if let Some(backend) = self.evaluator {
            config.evaluator.backend = backend;
        }
        if let Some(url) = &self.database_url {
            config.database.url = Some(url.clone());
        }
        if let Some(concurrency) = self.concurrency {
            config.pipeline.concurrency = concurrency;
        }
        validate(&config).context("invalid configuration")?;
        Ok(config)
    }
}

pub fn exit_code(outcome: &RunOutcome) -> u8 {
    if outcome.approved() {
        EXIT_APPROVED
    } else {
        EXIT_BLOCKED
    }
}

/// Stream the text summary goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Console {
    Stdout,
    Stderr,
}

fn print_summary(outcome: &RunOutcome, console: Console) {
    let summary = outcome.decision.summary();
    match console {
        Console::Stdout => print!("{}", render_summary(&summary, std::io::stdout().is_terminal())),
        Console::Stderr => eprint!("{}", render_summary(&summary, std::io::stderr().is_terminal())),
    }
}

/// Colorize the verdict and reason lines when writing to a terminal.
fn render_summary(summary: &str, colored: bool) -> String {
    if !colored {
        return summary.to_string();
    }
    let mut out = String::with_capacity(summary.len());
    for line in summary.lines() {
        let line = if line.starts_with("BLOCKED") {
            line.red().bold().to_string()
        } else if line.starts_with("APPROVED") {
            line.green().bold().to_string()
        } else if line.starts_with("  - ") {
            line.yellow().to_string()
        } else {
            line.to_string()
        };
        out.push_str(&line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SUMMARY: &str = "SQL gate: 1 statement(s) evaluated\nBLOCKED:\n  - no statements to evaluate\n";

    #[test]
    fn plain_summary_is_unchanged() {
        assert_eq!(render_summary(SUMMARY, false), SUMMARY);
    }

    #[test]
    fn colored_summary_keeps_every_line() {
        let rendered = render_summary(SUMMARY, true);
        assert!(rendered.contains("\u{1b}["));
        assert_eq!(rendered.lines().count(), 3);
        assert!(rendered.contains("no statements to evaluate"));
    }
}
