//! Auth handlers: login, logout, me.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use redub_core::error::AppError;

use crate::dto::request::LoginRequest;
use crate::dto::response::{LoginResponse, UserResponse};
use crate::extractors::AuthUser;
use crate::state::AppState;

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let result = state
        .session_manager
        .login(&req.username, &req.password)
        .await?;

    Ok(Json(LoginResponse {
        token: result.token,
        user: UserResponse::from(&result.user),
    }))
}

/// POST /auth/logout
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<StatusCode, AppError> {
    state.session_manager.logout(auth.session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /auth/me
pub async fn me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.session_manager.current_user(&auth).await?;
    Ok(Json(UserResponse::from(&user)))
}
