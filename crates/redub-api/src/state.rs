//! Application state shared across all handlers.

use std::sync::Arc;
use std::time::Instant;

use redub_auth::SessionManager;
use redub_core::config::AppConfig;
use redub_database::Store;
use redub_queue::QueueCoordinator;
use redub_realtime::SubscriptionGateway;
use redub_service::JobService;

/// Shared dependencies, passed to every handler via `State<AppState>`.
/// All fields are `Arc`-wrapped for cheap cloning across tasks.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// SQLite store handle.
    pub store: Store,
    /// Session lifecycle manager.
    pub session_manager: Arc<SessionManager>,
    /// The state machine core.
    pub job_service: Arc<JobService>,
    /// Queue coordinator.
    pub coordinator: Arc<QueueCoordinator>,
    /// Realtime subscription gateway.
    pub gateway: Arc<SubscriptionGateway>,
    /// Process start, for /healthz uptime.
    pub started_at: Instant,
}
