//! Job repository: CRUD, atomic creation, and status trigger semantics.

use chrono::Utc;
use sqlx::QueryBuilder;
use sqlx::types::Json;
use uuid::Uuid;

use redub_core::error::{AppError, ErrorKind};
use redub_core::result::AppResult;
use redub_core::types::page::PageQuery;
use redub_entity::event::EventKind;
use redub_entity::job::model::{CreateJob, Job};
use redub_entity::job::status::JobStatus;

use crate::connection::Store;

/// Filter for job listings.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    /// Restrict to a single status.
    pub status: Option<JobStatus>,
    /// Substring match on URL or job id.
    pub search: Option<String>,
}

/// Repository for job rows.
#[derive(Debug, Clone)]
pub struct JobRepository {
    store: Store,
}

impl JobRepository {
    /// Create a new job repository.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Insert a job row, its empty media row, and a `started` event in one
    /// transaction. Returns the created job.
    pub async fn create_atomic(&self, data: &CreateJob) -> AppResult<Job> {
        let now = Utc::now();
        let job = Job {
            id: Uuid::now_v7(),
            url: data.url.clone(),
            status: JobStatus::Queued,
            priority: data.priority,
            retry_count: 0,
            error: None,
            requested_dubbing: data.requested_dubbing,
            target_lang: data.target_lang.clone(),
            use_lively_voice: data.use_lively_voice,
            format_preset: data.format_preset,
            output_container: data.output_container,
            download_subtitles: data.download_subtitles,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };

        let mut tx = self.store.writer().begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        sqlx::query(
            "INSERT INTO jobs (id, url, status, priority, retry_count, error, \
             requested_dubbing, target_lang, use_lively_voice, format_preset, \
             output_container, download_subtitles, created_at, updated_at, completed_at) \
             VALUES (?1, ?2, ?3, ?4, 0, NULL, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11, NULL)",
        )
        .bind(job.id.to_string())
        .bind(&job.url)
        .bind(job.status.as_str())
        .bind(job.priority)
        .bind(job.requested_dubbing)
        .bind(&job.target_lang)
        .bind(job.use_lively_voice)
        .bind(job.format_preset)
        .bind(job.output_container)
        .bind(job.download_subtitles)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to insert job", e))?;

        sqlx::query("INSERT INTO media (job_id) VALUES (?1)")
            .bind(job.id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to insert media row", e)
            })?;

        sqlx::query(
            "INSERT INTO job_events (job_id, kind, payload, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(job.id.to_string())
        .bind(EventKind::Started.as_str())
        .bind(Json(serde_json::json!({ "url": job.url })))
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to insert started event", e)
        })?;

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit job creation", e)
        })?;

        Ok(job)
    }

    /// Find a job by id.
    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(self.store.reader())
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find job", e))
    }

    /// List jobs, most urgent first (priority desc, then creation order).
    pub async fn list(&self, filter: &JobFilter, page: &PageQuery) -> AppResult<(Vec<Job>, u64)> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM jobs");
        push_filter(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(self.store.reader())
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count jobs", e))?;

        let mut query = QueryBuilder::new("SELECT * FROM jobs");
        push_filter(&mut query, filter);
        query.push(" ORDER BY priority DESC, created_at ASC, id ASC LIMIT ");
        query.push_bind(page.limit());
        query.push(" OFFSET ");
        query.push_bind(page.offset());

        let jobs = query
            .build_query_as::<Job>()
            .fetch_all(self.store.reader())
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list jobs", e))?;

        Ok((jobs, total as u64))
    }

    /// Write a new status.
    ///
    /// Trigger semantics: `updated_at` is refreshed; `error` is set only
    /// when the new state is failed and cleared otherwise; `completed_at`
    /// is set on first entry into a terminal state and cleared when the
    /// job leaves the terminal set (retry/resume).
    pub async fn update_status(
        &self,
        id: Uuid,
        status: JobStatus,
        error: Option<&str>,
    ) -> AppResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE jobs SET \
             status = ?2, \
             error = CASE WHEN ?2 = 'failed' THEN COALESCE(?3, error) ELSE NULL END, \
             completed_at = CASE \
                 WHEN ?2 IN ('complete', 'failed', 'canceled') THEN COALESCE(completed_at, ?4) \
                 ELSE NULL END, \
             updated_at = ?4 \
             WHERE id = ?1",
        )
        .bind(id.to_string())
        .bind(status.as_str())
        .bind(error)
        .bind(now)
        .execute(self.store.writer())
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update job status", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Job {id} not found")));
        }
        Ok(())
    }

    /// Record a state transition: the `state_change` event row and the
    /// status write commit in one transaction.
    pub async fn record_transition(
        &self,
        id: Uuid,
        from: JobStatus,
        to: JobStatus,
        error: Option<&str>,
    ) -> AppResult<()> {
        let now = Utc::now();
        let mut tx = self.store.writer().begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transition", e)
        })?;

        sqlx::query(
            "INSERT INTO job_events (job_id, kind, payload, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(id.to_string())
        .bind(EventKind::StateChange.as_str())
        .bind(Json(serde_json::json!({ "from": from.as_str(), "to": to.as_str() })))
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to append transition event", e)
        })?;

        let result = sqlx::query(
            "UPDATE jobs SET \
             status = ?2, \
             error = CASE WHEN ?2 = 'failed' THEN COALESCE(?3, error) ELSE NULL END, \
             completed_at = CASE \
                 WHEN ?2 IN ('complete', 'failed', 'canceled') THEN COALESCE(completed_at, ?4) \
                 ELSE NULL END, \
             updated_at = ?4 \
             WHERE id = ?1",
        )
        .bind(id.to_string())
        .bind(to.as_str())
        .bind(error)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to write transition", e)
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Job {id} not found")));
        }

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit transition", e)
        })?;
        Ok(())
    }

    /// Increment the user-initiated retry counter.
    pub async fn increment_retry(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE jobs SET retry_count = retry_count + 1, updated_at = ?2 WHERE id = ?1")
            .bind(id.to_string())
            .bind(Utc::now())
            .execute(self.store.writer())
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to increment retry count", e)
            })?;
        Ok(())
    }

    /// Update the persisted priority.
    pub async fn update_priority(&self, id: Uuid, priority: i64) -> AppResult<()> {
        sqlx::query("UPDATE jobs SET priority = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id.to_string())
            .bind(priority)
            .bind(Utc::now())
            .execute(self.store.writer())
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to update priority", e)
            })?;
        Ok(())
    }

    /// Delete a job. Media and events are removed by the FK cascade.
    /// Returns false when no such job existed.
    pub async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?1")
            .bind(id.to_string())
            .execute(self.store.writer())
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete job", e))?;
        Ok(result.rows_affected() > 0)
    }
}

/// Append the WHERE clause for a job filter.
fn push_filter(query: &mut QueryBuilder<'_, sqlx::Sqlite>, filter: &JobFilter) {
    let mut prefix = " WHERE ";
    if let Some(status) = filter.status {
        query.push(prefix).push("status = ");
        query.push_bind(status.as_str());
        prefix = " AND ";
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        query.push(prefix).push("(url LIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR id LIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
}
