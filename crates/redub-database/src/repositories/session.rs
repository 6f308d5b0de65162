//! Session repository.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use redub_core::error::{AppError, ErrorKind};
use redub_core::result::AppResult;
use redub_entity::session::Session;

use crate::connection::Store;

/// Repository for authentication sessions.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    store: Store,
}

impl SessionRepository {
    /// Create a new session repository.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Create a session for a user.
    pub async fn create(&self, user_id: Uuid, expires_at: DateTime<Utc>) -> AppResult<Session> {
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            expires_at,
            revoked_at: None,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO sessions (id, user_id, expires_at, revoked_at, created_at) \
             VALUES (?1, ?2, ?3, NULL, ?4)",
        )
        .bind(session.id.to_string())
        .bind(session.user_id.to_string())
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(self.store.writer())
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create session", e))?;

        Ok(session)
    }

    /// Find a session by id.
    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Session>> {
        sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(self.store.reader())
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find session", e))
    }

    /// Mark a session revoked. Revoking twice keeps the first timestamp.
    pub async fn revoke(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE sessions SET revoked_at = COALESCE(revoked_at, ?2) WHERE id = ?1")
            .bind(id.to_string())
            .bind(Utc::now())
            .execute(self.store.writer())
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to revoke session", e)
            })?;
        Ok(())
    }
}
