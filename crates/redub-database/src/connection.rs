//! SQLite connection management: one writer pool, one reader pool.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::info;

use redub_core::config::DatabaseConfig;
use redub_core::error::{AppError, ErrorKind};

/// Handle to the SQLite store.
///
/// The writer pool holds exactly one connection, which serializes all
/// mutations structurally. Readers run concurrently on their own pool;
/// WAL mode lets them proceed during writes.
#[derive(Debug, Clone)]
pub struct Store {
    writer: SqlitePool,
    reader: SqlitePool,
}

impl Store {
    /// Open (creating if missing) the database file and both pools.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        if let Some(parent) = Path::new(&config.path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::with_source(
                        ErrorKind::Storage,
                        format!("Failed to create database directory: {e}"),
                        e,
                    )
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", config.path))
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, format!("Invalid database path: {e}"), e)
            })?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .foreign_keys(true);

        info!(path = %config.path, "Opening SQLite store");

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Database,
                    format!("Failed to open writer pool: {e}"),
                    e,
                )
            })?;

        let reader = SqlitePoolOptions::new()
            .max_connections(config.reader_connections)
            .connect_with(options)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Database,
                    format!("Failed to open reader pool: {e}"),
                    e,
                )
            })?;

        Ok(Self { writer, reader })
    }

    /// The single-connection writer pool.
    pub fn writer(&self) -> &SqlitePool {
        &self.writer
    }

    /// The concurrent reader pool.
    pub fn reader(&self) -> &SqlitePool {
        &self.reader
    }

    /// Check store connectivity.
    pub async fn health_check(&self) -> Result<bool, AppError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.reader)
            .await
            .map(|v| v == 1)
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Health check failed", e))
    }

    /// Close both pools.
    pub async fn close(&self) {
        self.writer.close().await;
        self.reader.close().await;
        info!("Store closed");
    }
}
