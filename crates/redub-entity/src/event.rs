//! Job event entity: the append-only audit log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use std::fmt;
use uuid::Uuid;

/// Kind of an audit log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Worker progress update.
    Progress,
    /// A `{from, to}` state transition.
    StateChange,
    /// Worker log line.
    Log,
    /// Worker error with a retryable flag.
    Error,
    /// Job accepted (written in the creation transaction).
    Started,
    /// Job reached a terminal state.
    Finished,
    /// User-initiated retry or resume.
    Retry,
}

impl EventKind {
    /// Return the kind as a lowercase snake string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Progress => "progress",
            Self::StateChange => "state_change",
            Self::Log => "log",
            Self::Error => "error",
            Self::Started => "started",
            Self::Finished => "finished",
            Self::Retry => "retry",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted audit log entry. Immutable once written; removed only by
/// the owning job's delete cascade.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    /// Insertion-ordered row id.
    pub id: i64,
    /// Owning job.
    pub job_id: Uuid,
    /// Entry kind.
    pub kind: EventKind,
    /// Opaque structured payload.
    pub payload: Json<serde_json::Value>,
    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}
