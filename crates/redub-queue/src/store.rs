//! Durable queue state over the shared SQLite store.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use redub_core::config::RecoverPolicy;
use redub_core::error::{AppError, ErrorKind};
use redub_core::result::AppResult;
use redub_database::Store;

use crate::entry::{EntryState, QueueEntry, QueueName, QueueSpec, QueueStats};

/// Repository for queue entries.
#[derive(Debug, Clone)]
pub struct QueueStore {
    store: Store,
}

impl QueueStore {
    /// Create a queue store over the shared database.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Idempotent enqueue: any live entry for the same (queue, job) is
    /// removed first, then a fresh waiting entry is inserted.
    pub async fn enqueue(
        &self,
        spec: &QueueSpec,
        job_id: Uuid,
        payload: serde_json::Value,
        priority: i64,
    ) -> AppResult<()> {
        let now = Utc::now();
        let mut tx = self.store.writer().begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin enqueue", e)
        })?;

        sqlx::query(
            "DELETE FROM queue_entries WHERE queue = ?1 AND job_id = ?2 \
             AND state IN ('waiting', 'active', 'delayed')",
        )
        .bind(spec.name.as_str())
        .bind(job_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to coalesce queue entry", e)
        })?;

        sqlx::query(
            "INSERT INTO queue_entries \
             (queue, job_id, payload, priority, state, attempts, max_attempts, \
              backoff_base_ms, run_at, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, 'waiting', 0, ?5, ?6, ?7, ?7, ?7)",
        )
        .bind(spec.name.as_str())
        .bind(job_id.to_string())
        .bind(Json(payload))
        .bind(priority)
        .bind(spec.max_attempts)
        .bind(spec.backoff_base_ms)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to enqueue", e))?;

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit enqueue", e)
        })?;

        tracing::debug!(queue = %spec.name, job_id = %job_id, priority, "Enqueued");
        Ok(())
    }

    /// Claim the next dispatchable entry: highest priority first, FIFO
    /// within equal priority, delayed entries once their backoff elapses.
    pub async fn claim_next(&self, queue: QueueName) -> AppResult<Option<QueueEntry>> {
        let now = Utc::now();
        sqlx::query_as::<_, QueueEntry>(
            "UPDATE queue_entries SET state = 'active', attempts = attempts + 1, updated_at = ?2 \
             WHERE id = ( \
                 SELECT id FROM queue_entries \
                 WHERE queue = ?1 AND (state = 'waiting' OR (state = 'delayed' AND run_at <= ?2)) \
                 ORDER BY priority DESC, created_at ASC, id ASC \
                 LIMIT 1 \
             ) RETURNING *",
        )
        .bind(queue.as_str())
        .bind(now)
        .fetch_optional(self.store.writer())
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to claim entry", e))
    }

    /// Mark an entry completed.
    pub async fn mark_completed(&self, id: i64) -> AppResult<()> {
        self.set_state(id, EntryState::Completed, None, None).await
    }

    /// Mark an entry failed (dead letter).
    pub async fn mark_failed(&self, id: i64, error: &str) -> AppResult<()> {
        self.set_state(id, EntryState::Failed, Some(error), None)
            .await
    }

    /// Schedule a delayed re-dispatch after a transient failure.
    pub async fn mark_delayed(
        &self,
        id: i64,
        run_at: DateTime<Utc>,
        error: &str,
    ) -> AppResult<()> {
        self.set_state(id, EntryState::Delayed, Some(error), Some(run_at))
            .await
    }

    async fn set_state(
        &self,
        id: i64,
        state: EntryState,
        error: Option<&str>,
        run_at: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE queue_entries SET state = ?2, last_error = COALESCE(?3, last_error), \
             run_at = COALESCE(?4, run_at), updated_at = ?5 WHERE id = ?1",
        )
        .bind(id)
        .bind(state)
        .bind(error)
        .bind(run_at)
        .bind(now)
        .execute(self.store.writer())
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to update entry state", e)
        })?;
        Ok(())
    }

    /// Reshuffle still-waiting (or delayed) entries after a priority
    /// change. Active entries are already dispatched and keep theirs.
    pub async fn update_priority(&self, job_id: Uuid, priority: i64) -> AppResult<()> {
        sqlx::query(
            "UPDATE queue_entries SET priority = ?2, updated_at = ?3 \
             WHERE job_id = ?1 AND state IN ('waiting', 'delayed')",
        )
        .bind(job_id.to_string())
        .bind(priority)
        .bind(Utc::now())
        .execute(self.store.writer())
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to update entry priority", e)
        })?;
        Ok(())
    }

    /// Best-effort removal of any live entry for (queue, job). Succeeds
    /// whether or not an entry exists.
    pub async fn remove(&self, queue: QueueName, job_id: Uuid) -> AppResult<()> {
        sqlx::query(
            "DELETE FROM queue_entries WHERE queue = ?1 AND job_id = ?2 \
             AND state IN ('waiting', 'active', 'delayed')",
        )
        .bind(queue.as_str())
        .bind(job_id.to_string())
        .execute(self.store.writer())
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to remove entry", e))?;
        Ok(())
    }

    /// Entry counts per state for one queue.
    pub async fn stats(&self, queue: QueueName) -> AppResult<QueueStats> {
        let rows: Vec<(EntryState, i64)> = sqlx::query_as(
            "SELECT state, COUNT(*) FROM queue_entries WHERE queue = ?1 GROUP BY state",
        )
        .bind(queue.as_str())
        .fetch_all(self.store.reader())
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to read queue stats", e))?;

        let mut stats = QueueStats::default();
        for (state, count) in rows {
            let count = count as u64;
            match state {
                EntryState::Waiting => stats.waiting = count,
                EntryState::Active => stats.active = count,
                EntryState::Delayed => stats.delayed = count,
                EntryState::Completed => stats.completed = count,
                EntryState::Failed => stats.failed = count,
            }
        }
        Ok(stats)
    }

    /// Count of live entries for (queue, job).
    pub async fn live_count(&self, queue: QueueName, job_id: Uuid) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM queue_entries WHERE queue = ?1 AND job_id = ?2 \
             AND state IN ('waiting', 'active', 'delayed')",
        )
        .bind(queue.as_str())
        .bind(job_id.to_string())
        .fetch_one(self.store.reader())
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count entries", e))?;
        Ok(count as u64)
    }

    /// Recover entries left `active` by a previous process: re-dispatch
    /// (default) or fail them, per the configured policy.
    pub async fn recover_orphans(&self, policy: RecoverPolicy) -> AppResult<u64> {
        let now = Utc::now();
        let result = match policy {
            RecoverPolicy::Redispatch => {
                sqlx::query(
                    "UPDATE queue_entries SET state = 'waiting', updated_at = ?1 \
                     WHERE state = 'active'",
                )
                .bind(now)
                .execute(self.store.writer())
                .await
            }
            RecoverPolicy::Fail => {
                sqlx::query(
                    "UPDATE queue_entries SET state = 'failed', \
                     last_error = 'orphaned by restart', updated_at = ?1 \
                     WHERE state = 'active'",
                )
                .bind(now)
                .execute(self.store.writer())
                .await
            }
        }
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to recover orphans", e))?;

        let recovered = result.rows_affected();
        if recovered > 0 {
            tracing::info!(recovered, ?policy, "Recovered orphaned active entries");
        }
        Ok(recovered)
    }

    /// Reap terminal entries past their retention windows.
    pub async fn reap(
        &self,
        completed_retention_hours: u64,
        failed_retention_days: u64,
    ) -> AppResult<u64> {
        let now = Utc::now();
        let completed_before = now - ChronoDuration::hours(completed_retention_hours as i64);
        let failed_before = now - ChronoDuration::days(failed_retention_days as i64);

        let result = sqlx::query(
            "DELETE FROM queue_entries WHERE \
             (state = 'completed' AND updated_at < ?1) OR \
             (state = 'failed' AND updated_at < ?2)",
        )
        .bind(completed_before)
        .bind(failed_before)
        .execute(self.store.writer())
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to reap entries", e))?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redub_core::config::{DatabaseConfig, QueueConfig};
    use redub_database::migration;

    async fn temp_queue() -> (tempfile::TempDir, QueueStore, QueueSpec) {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            path: dir.path().join("q.db").to_string_lossy().into_owned(),
            ..Default::default()
        };
        let store = Store::connect(&config).await.unwrap();
        migration::run_migrations(&store).await.unwrap();
        let spec = QueueSpec::for_queue(QueueName::Download, &QueueConfig::default());
        (dir, QueueStore::new(store), spec)
    }

    #[tokio::test]
    async fn enqueue_is_idempotent() {
        let (_dir, queue, spec) = temp_queue().await;
        let job_id = Uuid::now_v7();

        for _ in 0..5 {
            queue
                .enqueue(&spec, job_id, serde_json::json!({"n": 1}), 0)
                .await
                .unwrap();
        }

        assert_eq!(queue.live_count(QueueName::Download, job_id).await.unwrap(), 1);
        let stats = queue.stats(QueueName::Download).await.unwrap();
        assert_eq!(stats.waiting, 1);
    }

    #[tokio::test]
    async fn claim_orders_by_priority_then_fifo() {
        let (_dir, queue, spec) = temp_queue().await;
        let low = Uuid::now_v7();
        let first_high = Uuid::now_v7();
        let second_high = Uuid::now_v7();

        queue
            .enqueue(&spec, low, serde_json::json!({}), 1)
            .await
            .unwrap();
        queue
            .enqueue(&spec, first_high, serde_json::json!({}), 9)
            .await
            .unwrap();
        queue
            .enqueue(&spec, second_high, serde_json::json!({}), 9)
            .await
            .unwrap();

        let a = queue.claim_next(QueueName::Download).await.unwrap().unwrap();
        let b = queue.claim_next(QueueName::Download).await.unwrap().unwrap();
        let c = queue.claim_next(QueueName::Download).await.unwrap().unwrap();
        assert_eq!(a.job_id, first_high);
        assert_eq!(b.job_id, second_high);
        assert_eq!(c.job_id, low);
        assert_eq!(a.attempts, 1);

        assert!(queue.claim_next(QueueName::Download).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delayed_entries_wait_for_their_backoff() {
        let (_dir, queue, spec) = temp_queue().await;
        let job_id = Uuid::now_v7();
        queue
            .enqueue(&spec, job_id, serde_json::json!({}), 0)
            .await
            .unwrap();

        let entry = queue.claim_next(QueueName::Download).await.unwrap().unwrap();
        queue
            .mark_delayed(entry.id, Utc::now() + ChronoDuration::hours(1), "transient")
            .await
            .unwrap();

        assert!(queue.claim_next(QueueName::Download).await.unwrap().is_none());

        // Bring the backoff target into the past; the entry is claimable.
        queue
            .mark_delayed(entry.id, Utc::now() - ChronoDuration::seconds(1), "transient")
            .await
            .unwrap();
        let again = queue.claim_next(QueueName::Download).await.unwrap().unwrap();
        assert_eq!(again.id, entry.id);
        assert_eq!(again.attempts, 2);
    }

    #[tokio::test]
    async fn recover_redispatches_active_entries() {
        let (_dir, queue, spec) = temp_queue().await;
        let job_id = Uuid::now_v7();
        queue
            .enqueue(&spec, job_id, serde_json::json!({}), 0)
            .await
            .unwrap();
        queue.claim_next(QueueName::Download).await.unwrap().unwrap();

        let recovered = queue.recover_orphans(RecoverPolicy::Redispatch).await.unwrap();
        assert_eq!(recovered, 1);
        let stats = queue.stats(QueueName::Download).await.unwrap();
        assert_eq!(stats.waiting, 1);
        assert_eq!(stats.active, 0);
    }
}
