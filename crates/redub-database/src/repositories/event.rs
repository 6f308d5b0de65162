//! Job event repository: append-only audit log.

use chrono::Utc;
use sqlx::types::Json;
use uuid::Uuid;

use redub_core::error::{AppError, ErrorKind};
use redub_core::result::AppResult;
use redub_core::types::page::PageQuery;
use redub_entity::event::{EventKind, JobEvent};

use crate::connection::Store;

/// Repository for the append-only job event log.
#[derive(Debug, Clone)]
pub struct EventRepository {
    store: Store,
}

impl EventRepository {
    /// Create a new event repository.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Append an event. Safe under concurrent calls; the writer pool
    /// serializes inserts and the rowid preserves insertion order.
    pub async fn append(
        &self,
        job_id: Uuid,
        kind: EventKind,
        payload: serde_json::Value,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO job_events (job_id, kind, payload, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(job_id.to_string())
        .bind(kind.as_str())
        .bind(Json(payload))
        .bind(Utc::now())
        .execute(self.store.writer())
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to append event", e))?;
        Ok(())
    }

    /// List events for a job, newest first, with the total count.
    pub async fn list(&self, job_id: Uuid, page: &PageQuery) -> AppResult<(Vec<JobEvent>, u64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM job_events WHERE job_id = ?1")
            .bind(job_id.to_string())
            .fetch_one(self.store.reader())
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count events", e))?;

        let events = sqlx::query_as::<_, JobEvent>(
            "SELECT * FROM job_events WHERE job_id = ?1 \
             ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3",
        )
        .bind(job_id.to_string())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.store.reader())
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list events", e))?;

        Ok((events, total as u64))
    }

    /// Full event history in insertion order (resume planner input).
    pub async fn history(&self, job_id: Uuid) -> AppResult<Vec<JobEvent>> {
        sqlx::query_as::<_, JobEvent>(
            "SELECT * FROM job_events WHERE job_id = ?1 ORDER BY id ASC",
        )
        .bind(job_id.to_string())
        .fetch_all(self.store.reader())
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load event history", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::job::JobRepository;
    use crate::testing::temp_store;
    use redub_entity::job::model::CreateJob;
    use redub_entity::job::options::{FormatPreset, OutputContainer};

    #[tokio::test]
    async fn append_then_list_returns_newest_first() {
        let (_dir, store) = temp_store().await;
        let jobs = JobRepository::new(store.clone());
        let events = EventRepository::new(store);

        let job = jobs
            .create_atomic(&CreateJob {
                url: "https://example.test/v1".into(),
                priority: 0,
                requested_dubbing: false,
                target_lang: "ru".into(),
                use_lively_voice: false,
                format_preset: FormatPreset::Best,
                output_container: OutputContainer::Mkv,
                download_subtitles: false,
            })
            .await
            .unwrap();

        events
            .append(
                job.id,
                EventKind::StateChange,
                serde_json::json!({"from": "queued", "to": "downloading"}),
            )
            .await
            .unwrap();
        events
            .append(
                job.id,
                EventKind::Log,
                serde_json::json!({"level": "info", "message": "starting"}),
            )
            .await
            .unwrap();

        let (log, total) = events.list(job.id, &PageQuery::default()).await.unwrap();
        assert_eq!(total, 3); // started + state_change + log
        assert_eq!(log[0].kind, EventKind::Log);
        assert_eq!(log[1].kind, EventKind::StateChange);
        assert_eq!(log[1].payload.0["to"], "downloading");

        let history = events.history(job.id).await.unwrap();
        assert_eq!(history.first().unwrap().kind, EventKind::Started);
        assert_eq!(history.last().unwrap().kind, EventKind::Log);
    }
}
