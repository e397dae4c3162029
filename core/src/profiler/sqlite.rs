//! SQLite probe backend (`sqlite://path`, `sqlite::memory:`)
//!
//! SQLite has no analyzed plan, so probes use `EXPLAIN QUERY PLAN`, which
//! prepares the statement without running it. Missing relations and syntax
//! errors still surface at prepare time.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::Connection;

use super::{ProbeConnection, ProbeError};
use crate::error::{GateError, Result};

pub struct SqliteProbe {
    conn: Connection,
}

impl SqliteProbe {
    /// Open a probe from `sqlite::memory:`, `sqlite://<path>` or `sqlite:<path>`.
    pub fn open(url: &str) -> Result<Self> {
        let conn = if url == "sqlite::memory:" {
            Connection::open_in_memory()
        } else {
            let path = url
                .strip_prefix("sqlite://")
                .or_else(|| url.strip_prefix("sqlite:"))
                .unwrap_or(url);
            Connection::open(path)
        }
        .map_err(|e| GateError::DatabaseConnect(format!("{url}: {e}")))?;
        Ok(Self { conn })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }
}

fn db_error(err: rusqlite::Error) -> ProbeError {
    ProbeError::Database(err.to_string())
}

#[async_trait]
impl ProbeConnection for SqliteProbe {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn begin(&mut self, statement_timeout: Duration) -> std::result::Result<(), ProbeError> {
        self.conn.busy_timeout(statement_timeout).map_err(db_error)?;
        self.conn.execute_batch("BEGIN").map_err(db_error)
    }

    async fn explain(&mut self, sql: &str) -> std::result::Result<Vec<String>, ProbeError> {
        let mut stmt = self
            .conn
            .prepare(&format!("EXPLAIN QUERY PLAN {sql}"))
            .map_err(db_error)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(db_error)?;

        // Indent each node under its parent.
        let mut depth_by_id: HashMap<i64, usize> = HashMap::new();
        let mut lines = Vec::new();
        for row in rows {
            let (id, parent, detail) = row.map_err(db_error)?;
            let depth = depth_by_id.get(&parent).map_or(0, |d| d + 1);
            depth_by_id.insert(id, depth);
            lines.push(format!("{}{detail}", "  ".repeat(depth)));
        }
        Ok(lines)
    }

    async fn rollback(&mut self) -> std::result::Result<(), ProbeError> {
        if self.conn.is_autocommit() {
            return Ok(());
        }
        self.conn.execute_batch("ROLLBACK").map_err(db_error)
    }
}
