//! Health check handler.

use axum::Json;
use axum::extract::State;
use chrono::Utc;

use redub_queue::QueueName;

use crate::dto::response::{HealthDependencies, HealthResponse};
use crate::state::AppState;

/// GET /healthz
pub async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_ok = state.store.health_check().await.unwrap_or(false);
    let queue_ok = state.coordinator.stats(QueueName::Download).await.is_ok();
    let fs_ok = std::path::Path::new(&state.config.media.root).is_dir();

    let status = if db_ok && queue_ok && fs_ok {
        "ok"
    } else if db_ok {
        "degraded"
    } else {
        "unhealthy"
    };

    Json(HealthResponse {
        status: status.to_string(),
        uptime: state.started_at.elapsed().as_secs(),
        timestamp: Utc::now(),
        dependencies: HealthDependencies {
            queue: dep_status(queue_ok),
            db: dep_status(db_ok),
            filesystem: dep_status(fs_ok),
        },
    })
}

fn dep_status(ok: bool) -> String {
    if ok { "ok" } else { "error" }.to_string()
}
