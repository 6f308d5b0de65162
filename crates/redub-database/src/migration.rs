//! Database migration runner.

use tracing::info;

use redub_core::error::{AppError, ErrorKind};

use crate::connection::Store;

/// Run all pending database migrations on the writer connection.
pub async fn run_migrations(store: &Store) -> Result<(), AppError> {
    info!("Running database migrations...");

    sqlx::migrate!("../../migrations")
        .run(store.writer())
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to run migrations: {e}"),
                e,
            )
        })?;

    info!("Database migrations completed");
    Ok(())
}
