//! Queue entry model and per-queue dispatch parameters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use redub_core::config::QueueConfig;

/// The three pipeline queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum QueueName {
    /// Video download stage.
    Download,
    /// Voice-over dubbing stage.
    Dub,
    /// Audio mixing / muxing stage.
    Mux,
}

impl QueueName {
    /// Queue name string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::Dub => "dub",
            Self::Mux => "mux",
        }
    }

    /// All queues.
    pub const ALL: [QueueName; 3] = [QueueName::Download, QueueName::Dub, QueueName::Mux];
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    /// Eligible for dispatch.
    Waiting,
    /// Claimed by a worker slot.
    Active,
    /// Scheduled for a backoff re-dispatch at `run_at`.
    Delayed,
    /// Finished successfully; reaped after the retention window.
    Completed,
    /// Exhausted or permanently failed; kept for dead-letter inspection.
    Failed,
}

impl EntryState {
    /// Whether the entry can still be dispatched (or is being worked).
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Waiting | Self::Active | Self::Delayed)
    }
}

/// A durable queue entry.
#[derive(Debug, Clone, FromRow)]
pub struct QueueEntry {
    /// Row id.
    pub id: i64,
    /// Owning queue.
    pub queue: QueueName,
    /// Job this entry belongs to.
    pub job_id: Uuid,
    /// Typed stage payload as JSON.
    pub payload: Json<serde_json::Value>,
    /// Dispatch priority (mirrors the job's priority).
    pub priority: i64,
    /// Current state.
    pub state: EntryState,
    /// Attempts consumed so far (incremented at claim time).
    pub attempts: i64,
    /// Maximum attempts before the entry fails.
    pub max_attempts: i64,
    /// Exponential backoff base in milliseconds.
    pub backoff_base_ms: i64,
    /// Earliest dispatch time (backoff target for delayed entries).
    pub run_at: DateTime<Utc>,
    /// Last worker error message.
    pub last_error: Option<String>,
    /// When the entry was enqueued.
    pub created_at: DateTime<Utc>,
    /// When the entry was last updated.
    pub updated_at: DateTime<Utc>,
}

impl QueueEntry {
    /// Backoff delay for the attempt just consumed: `base * 2^(attempt-1)`.
    pub fn backoff_delay(&self) -> Duration {
        let attempt = self.attempts.max(1) as u32;
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis((self.backoff_base_ms as u64).saturating_mul(factor))
    }

    /// Deserialize the typed payload.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.0.clone())
    }
}

/// Per-queue dispatch parameters.
#[derive(Debug, Clone, Copy)]
pub struct QueueSpec {
    /// The queue.
    pub name: QueueName,
    /// Maximum in-flight entries.
    pub concurrency: usize,
    /// Retry attempts.
    pub max_attempts: i64,
    /// Exponential backoff base.
    pub backoff_base_ms: i64,
    /// In-flight timeout.
    pub timeout: Duration,
}

impl QueueSpec {
    /// Fixed dispatch parameters for a queue, with concurrency clamped to
    /// the allowed band (download is a strict single writer).
    pub fn for_queue(name: QueueName, config: &QueueConfig) -> Self {
        match name {
            QueueName::Download => Self {
                name,
                concurrency: 1,
                max_attempts: 3,
                backoff_base_ms: 1000,
                timeout: Duration::from_secs(60 * 60),
            },
            QueueName::Dub => Self {
                name,
                concurrency: config.dubbing_concurrency.clamp(2, 4),
                max_attempts: 3,
                backoff_base_ms: 2000,
                timeout: Duration::from_secs(30 * 60),
            },
            QueueName::Mux => Self {
                name,
                concurrency: config.muxing_concurrency.clamp(1, 2),
                max_attempts: 3,
                backoff_base_ms: 2000,
                timeout: Duration::from_secs(30 * 60),
            },
        }
    }
}

/// Entry counts per state for one queue.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
    pub delayed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let mut entry = QueueEntry {
            id: 1,
            queue: QueueName::Download,
            job_id: Uuid::now_v7(),
            payload: Json(serde_json::json!({})),
            priority: 0,
            state: EntryState::Active,
            attempts: 1,
            max_attempts: 3,
            backoff_base_ms: 1000,
            run_at: Utc::now(),
            last_error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(entry.backoff_delay(), Duration::from_millis(1000));
        entry.attempts = 2;
        assert_eq!(entry.backoff_delay(), Duration::from_millis(2000));
        entry.attempts = 3;
        assert_eq!(entry.backoff_delay(), Duration::from_millis(4000));
    }

    #[test]
    fn download_queue_is_single_writer() {
        let config = QueueConfig {
            download_concurrency: 8,
            ..Default::default()
        };
        let spec = QueueSpec::for_queue(QueueName::Download, &config);
        assert_eq!(spec.concurrency, 1);
        assert_eq!(spec.backoff_base_ms, 1000);
    }
}
