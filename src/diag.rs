//! Append-only diagnostics sink.
//!
//! One row per lifecycle or error event, written to the `app_log` table
//! next to the records. Every call is best-effort: a failure to write
//! the row is discarded locally, so a broken log can never take down
//! the pipeline that is trying to report through it. Rows are mirrored
//! to `tracing` for process-local visibility.

use chrono::Utc;
use rusqlite::Connection;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Debug,
    Error,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Error => "ERROR",
        }
    }
}

#[derive(Clone)]
pub struct Diagnostics {
    conn: Arc<Mutex<Connection>>,
}

impl Diagnostics {
    /// Build a sink over a connection whose migrations have already run
    /// (see `RecordStore::open`).
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub async fn info(&self, function: &str, message: &str) {
        self.append(function, LogLevel::Info, message, None).await;
    }

    pub async fn debug(&self, function: &str, message: &str) {
        self.append(function, LogLevel::Debug, message, None).await;
    }

    pub async fn error(&self, function: &str, message: &str) {
        self.append(function, LogLevel::Error, message, None).await;
    }

    /// Error row with an extra detail column (error chain, raw body, ...)
    /// that should stay out of the one-line message.
    pub async fn error_detail(&self, function: &str, message: &str, detail: &str) {
        self.append(function, LogLevel::Error, message, Some(detail))
            .await;
    }

    async fn append(&self, function: &str, level: LogLevel, message: &str, detail: Option<&str>) {
        match level {
            LogLevel::Info => info!("[{function}] {message}"),
            LogLevel::Debug => debug!("[{function}] {message}"),
            LogLevel::Error => error!("[{function}] {message}"),
        }

        let conn = self.conn.lock().await;
        let _ = conn.execute(
            "INSERT INTO app_log (timestamp, function, level, message, detail)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                Utc::now().to_rfc3339(),
                function,
                level.as_str(),
                message,
                detail
            ],
        );
    }
}
