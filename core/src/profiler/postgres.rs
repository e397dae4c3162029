//! PostgreSQL probe backend
//!
//! Plans come from `EXPLAIN (ANALYZE, VERBOSE, COSTS, BUFFERS, TIMING)`,
//! read through the simple-query protocol so every plan row arrives as text.

use std::time::Duration;

use async_trait::async_trait;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};

use super::{ProbeConnection, ProbeError, redact_url};
use crate::error::{GateError, Result};

const EXPLAIN_PREFIX: &str = "EXPLAIN (ANALYZE, VERBOSE, COSTS, BUFFERS, TIMING)";

pub struct PostgresProbe {
    client: Client,
}

impl PostgresProbe {
    /// Connect without TLS and drive the connection on a background task.
    pub async fn connect(url: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(url, NoTls)
            .await
            .map_err(|e| GateError::DatabaseConnect(format!("{}: {}", redact_url(url), pg_error(&e))))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!("postgres connection closed: {e}");
            }
        });

        Ok(Self { client })
    }
}

/// Server message when available, transport error otherwise.
fn pg_error(err: &tokio_postgres::Error) -> String {
    match err.as_db_error() {
        Some(db) => format!("{}: {}", db.severity(), db.message()),
        None => err.to_string(),
    }
}

fn db_error(err: tokio_postgres::Error) -> ProbeError {
    ProbeError::Database(pg_error(&err))
}

#[async_trait]
impl ProbeConnection for PostgresProbe {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn begin(&mut self, statement_timeout: Duration) -> std::result::Result<(), ProbeError> {
        let ms = statement_timeout.as_millis();
        self.client
            .batch_execute(&format!("BEGIN; SET LOCAL statement_timeout = {ms}"))
            .await
            .map_err(db_error)
    }

    async fn explain(&mut self, sql: &str) -> std::result::Result<Vec<String>, ProbeError> {
        let messages = self
            .client
            .simple_query(&format!("{EXPLAIN_PREFIX} {sql}"))
            .await
            .map_err(db_error)?;

        Ok(messages
            .iter()
            .filter_map(|message| match message {
                SimpleQueryMessage::Row(row) => row.get(0).map(str::to_string),
                _ => None,
            })
            .collect())
    }

    async fn rollback(&mut self) -> std::result::Result<(), ProbeError> {
        self.client.batch_execute("ROLLBACK").await.map_err(db_error)
    }
}
