use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::dispatch::{PipelineError, RecordSink};
use crate::record::RunningRecord;

/// SQLite store holding the archived running records and the
/// diagnostics log. The pipeline only ever appends — history is never
/// updated or deleted here.
#[derive(Clone)]
pub struct RecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl RecordStore {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        // journal_mode PRAGMA always returns the resulting mode, so use query_row
        let _: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;

        Self::run_migrations(&conn)?;

        info!("Record store initialized at: {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn run_migrations(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            -- Archived records, one append per processed image event.
            -- Column order is the record's canonical order.
            CREATE TABLE IF NOT EXISTS records (
                date TEXT NOT NULL,
                distance TEXT NOT NULL,
                time TEXT NOT NULL,
                pace TEXT,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- Lifecycle/error log, one row per diagnostics call.
            CREATE TABLE IF NOT EXISTS app_log (
                timestamp TEXT NOT NULL,
                function TEXT NOT NULL,
                level TEXT NOT NULL,
                message TEXT NOT NULL,
                detail TEXT
            );
            ",
        )?;
        Ok(())
    }

    /// Shared connection handle for the diagnostics sink.
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// Append one finalized record in the fixed column order
    /// `date, distance, time, pace, user_id`.
    pub async fn append(&self, record: &RunningRecord) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO records (date, distance, time, pace, user_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                record.date,
                record.distance,
                record.time,
                record.pace,
                record.user_id
            ],
        )
        .context("Failed to append record")?;
        Ok(())
    }
}

#[async_trait]
impl RecordSink for RecordStore {
    async fn append_record(&self, record: &RunningRecord) -> Result<(), PipelineError> {
        self.append(record).await.map_err(PipelineError::PersistFailed)
    }
}
