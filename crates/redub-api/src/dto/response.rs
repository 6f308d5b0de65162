//! Response bodies.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use redub_entity::event::JobEvent;
use redub_entity::job::model::Job;
use redub_entity::user::User;

/// Authenticated user summary.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    /// User id.
    pub id: Uuid,
    /// Login name.
    pub username: String,
    /// Role.
    pub role: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role.to_string(),
        }
    }
}

/// POST /auth/login response.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Bearer token.
    pub token: String,
    /// The authenticated user.
    pub user: UserResponse,
}

/// GET /jobs response.
#[derive(Debug, Serialize)]
pub struct JobListResponse {
    /// Jobs on this page.
    pub jobs: Vec<Job>,
    /// Total matching jobs.
    pub total: u64,
    /// Applied limit.
    pub limit: u32,
    /// Applied offset.
    pub offset: u32,
}

/// GET /jobs/{id}/logs response.
#[derive(Debug, Serialize)]
pub struct LogsResponse {
    /// Events on this page, newest first.
    pub events: Vec<JobEvent>,
    /// Total events for the job.
    pub total: u64,
    /// Applied limit.
    pub limit: u32,
    /// Applied offset.
    pub offset: u32,
}

/// POST /jobs/{id}/resume response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeResponse {
    /// The job after the resume transition.
    #[serde(flatten)]
    pub job: Job,
    /// Stage the job restarts at.
    pub resumed_from: String,
}

/// Per-dependency health states.
#[derive(Debug, Serialize)]
pub struct HealthDependencies {
    /// Queue coordinator reachability.
    pub queue: String,
    /// Store reachability.
    pub db: String,
    /// Media root availability.
    pub filesystem: String,
}

/// GET /healthz response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `"ok"`, `"degraded"` or `"unhealthy"`.
    pub status: String,
    /// Seconds since process start.
    pub uptime: u64,
    /// Server time.
    pub timestamp: DateTime<Utc>,
    /// Per-dependency states.
    pub dependencies: HealthDependencies,
}
