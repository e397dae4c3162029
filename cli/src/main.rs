use std::process::ExitCode;

use clap::Parser;
use sqlgate_cli::{EXIT_INFRASTRUCTURE, GateCli};

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is fine; the environment may already be set.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = GateCli::parse();
    match cli.run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(EXIT_INFRASTRUCTURE)
        }
    }
}
