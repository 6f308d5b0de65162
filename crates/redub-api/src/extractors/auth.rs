//! `AuthUser` extractor: pulls the bearer token from the Authorization
//! header and validates it against the session store.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use redub_auth::AuthContext;
use redub_core::error::AppError;

use crate::state::AppState;

/// Authenticated user context available to handlers.
#[derive(Debug, Clone)]
pub struct AuthUser(pub AuthContext);

impl std::ops::Deref for AuthUser {
    type Target = AuthContext;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::unauthorized("Invalid Authorization header format"))?;

        let ctx = state.session_manager.authenticate(token).await?;
        Ok(AuthUser(ctx))
    }
}
