//! Request bodies and query parameters.

use serde::Deserialize;

use redub_service::ControlAction;

/// POST /auth/login body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Login name.
    pub username: String,
    /// Plaintext password.
    pub password: String,
}

/// POST /jobs/{id}/control body.
#[derive(Debug, Deserialize)]
pub struct ControlRequest {
    /// Requested action.
    pub action: ControlAction,
    /// New priority, required for `prioritize`.
    pub priority: Option<i64>,
}

/// GET /jobs query parameters.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct JobListQuery {
    /// Restrict to a single status.
    pub status: Option<String>,
    /// Substring match on URL or job id.
    pub search: Option<String>,
    /// Page size.
    pub limit: Option<u32>,
    /// Page offset.
    pub offset: Option<u32>,
}

/// GET /jobs/{id}/logs query parameters.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LogsQuery {
    /// Page size.
    pub limit: Option<u32>,
    /// Page offset.
    pub offset: Option<u32>,
}
