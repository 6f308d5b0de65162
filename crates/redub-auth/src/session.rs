//! Session lifecycle manager: login, logout, token validation.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use redub_core::error::AppError;
use redub_database::repositories::session::SessionRepository;
use redub_database::repositories::user::UserRepository;
use redub_entity::user::{User, UserRole};

use crate::jwt::{JwtDecoder, JwtEncoder};
use crate::password::PasswordHasher;

/// Result of a successful login.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LoginResult {
    /// Bearer token for subsequent requests.
    pub token: String,
    /// The authenticated user.
    pub user: User,
}

/// Authenticated request context derived from a validated token.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Authenticated user id.
    pub user_id: Uuid,
    /// Session backing the token.
    pub session_id: Uuid,
    /// Username.
    pub username: String,
    /// Role at token issuance.
    pub role: UserRole,
}

/// Manages the session lifecycle.
#[derive(Debug, Clone)]
pub struct SessionManager {
    jwt_encoder: Arc<JwtEncoder>,
    jwt_decoder: Arc<JwtDecoder>,
    user_repo: Arc<UserRepository>,
    session_repo: Arc<SessionRepository>,
    password_hasher: Arc<PasswordHasher>,
}

impl SessionManager {
    /// Creates a new session manager.
    pub fn new(
        jwt_encoder: Arc<JwtEncoder>,
        jwt_decoder: Arc<JwtDecoder>,
        user_repo: Arc<UserRepository>,
        session_repo: Arc<SessionRepository>,
        password_hasher: Arc<PasswordHasher>,
    ) -> Self {
        Self {
            jwt_encoder,
            jwt_decoder,
            user_repo,
            session_repo,
            password_hasher,
        }
    }

    /// Validate credentials, create a session row, and issue a token.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResult, AppError> {
        let user = self
            .user_repo
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::unauthorized("Invalid username or password"))?;

        let valid = self
            .password_hasher
            .verify_password(password, &user.password_hash)?;
        if !valid {
            return Err(AppError::unauthorized("Invalid username or password"));
        }

        // Token and session share one expiry; the session row is the
        // revocation authority.
        let expires_at = self.jwt_encoder.expires_at_from_now();
        let session = self.session_repo.create(user.id, expires_at).await?;
        let (token, _) = self.jwt_encoder.generate_token(&user, session.id)?;

        info!(user_id = %user.id, session_id = %session.id, "Login successful");

        Ok(LoginResult { token, user })
    }

    /// Revoke the session behind a validated token.
    pub async fn logout(&self, session_id: Uuid) -> Result<(), AppError> {
        self.session_repo.revoke(session_id).await?;
        info!(session_id = %session_id, "Session revoked");
        Ok(())
    }

    /// Validate a bearer token: signature, expiry, and session liveness.
    pub async fn authenticate(&self, token: &str) -> Result<AuthContext, AppError> {
        let claims = self.jwt_decoder.decode_token(token)?;

        let session = self
            .session_repo
            .find_by_id(claims.session_id())
            .await?
            .ok_or_else(|| AppError::unauthorized("Session not found"))?;

        if !session.is_active(Utc::now()) {
            return Err(AppError::session_expired("Session is expired or revoked"));
        }

        Ok(AuthContext {
            user_id: claims.user_id(),
            session_id: claims.session_id(),
            username: claims.username,
            role: claims.role,
        })
    }

    /// Look up the user behind an authenticated context.
    pub async fn current_user(&self, ctx: &AuthContext) -> Result<User, AppError> {
        self.user_repo
            .find_by_id(ctx.user_id)
            .await?
            .ok_or_else(|| AppError::unauthorized("User no longer exists"))
    }
}
