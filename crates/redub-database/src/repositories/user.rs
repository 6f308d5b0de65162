//! User repository.

use chrono::Utc;
use uuid::Uuid;

use redub_core::error::{AppError, ErrorKind};
use redub_core::result::AppResult;
use redub_entity::user::{User, UserRole};

use crate::connection::Store;

/// Repository for user accounts.
#[derive(Debug, Clone)]
pub struct UserRepository {
    store: Store,
}

impl UserRepository {
    /// Create a new user repository.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Create a user with a pre-hashed password.
    pub async fn create(
        &self,
        username: &str,
        password_hash: &str,
        role: UserRole,
    ) -> AppResult<User> {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO users (id, username, password_hash, role, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(user.id.to_string())
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .execute(self.store.writer())
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create user", e))?;

        Ok(user)
    }

    /// Find a user by login name.
    pub async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?1")
            .bind(username)
            .fetch_optional(self.store.reader())
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find user", e))
    }

    /// Find a user by id.
    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(self.store.reader())
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find user", e))
    }

    /// Total number of accounts.
    pub async fn count(&self) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.store.reader())
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count users", e))
    }
}
