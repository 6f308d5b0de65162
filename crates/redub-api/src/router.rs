//! Route definitions for the control API.

use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(auth_routes())
        .merge(job_routes())
        .route("/healthz", get(handlers::health::healthz))
        .route("/ws", get(handlers::ws::ws_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Auth endpoints: login, logout, me.
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/me", get(handlers::auth::me))
}

/// Job CRUD and control endpoints.
fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/jobs", post(handlers::jobs::create))
        .route("/jobs", get(handlers::jobs::list))
        .route("/jobs/{id}", get(handlers::jobs::get))
        .route("/jobs/{id}", delete(handlers::jobs::delete))
        .route("/jobs/{id}/cancel", post(handlers::jobs::cancel))
        .route("/jobs/{id}/retry", post(handlers::jobs::retry))
        .route("/jobs/{id}/resume", post(handlers::jobs::resume))
        .route("/jobs/{id}/control", post(handlers::jobs::control))
        .route("/jobs/{id}/logs", get(handlers::jobs::logs))
}
