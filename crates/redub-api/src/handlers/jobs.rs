//! Job handlers: CRUD and control operations.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use uuid::Uuid;

use redub_core::error::AppError;
use redub_core::types::page::PageQuery;
use redub_database::repositories::job::JobFilter;
use redub_entity::job::model::Job;
use redub_entity::job::status::JobStatus;
use redub_service::{CreateJobRequest, JobDetails};

use crate::dto::request::{ControlRequest, JobListQuery, LogsQuery};
use crate::dto::response::{JobListResponse, LogsResponse, ResumeResponse};
use crate::extractors::AuthUser;
use crate::state::AppState;

/// POST /jobs
pub async fn create(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(req): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<Job>), AppError> {
    let job = state.job_service.create(req).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// GET /jobs?status=&search=&limit=&offset=
pub async fn list(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<JobListQuery>,
) -> Result<Json<JobListResponse>, AppError> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|raw| {
            JobStatus::parse(raw)
                .ok_or_else(|| AppError::validation(format!("Unknown status: {raw}")))
        })
        .transpose()?;

    let filter = JobFilter {
        status,
        search: query.search.clone(),
    };
    let page = PageQuery::new(query.limit.unwrap_or(25), query.offset.unwrap_or(0));
    let (jobs, total) = state.job_service.list(&filter, &page).await?;

    Ok(Json(JobListResponse {
        jobs,
        total,
        limit: page.limit,
        offset: page.offset,
    }))
}

/// GET /jobs/{id}
pub async fn get(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<JobDetails>, AppError> {
    Ok(Json(state.job_service.get(id).await?))
}

/// POST /jobs/{id}/cancel
pub async fn cancel(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, AppError> {
    Ok(Json(state.job_service.cancel(id).await?))
}

/// POST /jobs/{id}/retry
pub async fn retry(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, AppError> {
    Ok(Json(state.job_service.retry(id).await?))
}

/// POST /jobs/{id}/resume
pub async fn resume(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ResumeResponse>, AppError> {
    let (job, stage) = state.job_service.resume(id).await?;
    Ok(Json(ResumeResponse {
        job,
        resumed_from: stage.as_str().to_string(),
    }))
}

/// POST /jobs/{id}/control
pub async fn control(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ControlRequest>,
) -> Result<Json<Job>, AppError> {
    Ok(Json(
        state
            .job_service
            .control(id, req.action, req.priority)
            .await?,
    ))
}

/// DELETE /jobs/{id}
pub async fn delete(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.job_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /jobs/{id}/logs?limit=&offset=
pub async fn logs(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<LogsResponse>, AppError> {
    let page = PageQuery::new(query.limit.unwrap_or(50), query.offset.unwrap_or(0));
    let (events, total) = state.job_service.logs(id, &page).await?;
    Ok(Json(LogsResponse {
        events,
        total,
        limit: page.limit,
        offset: page.offset,
    }))
}
