//! Job entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::options::{FormatPreset, OutputContainer};
use super::status::JobStatus;

/// A pipeline job.
///
/// Identified by a UUIDv7, which sorts lexicographically in creation
/// order. The option bundle is stored flat on the row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Unique job identifier.
    pub id: Uuid,
    /// Source video URL.
    pub url: String,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Dispatch priority (0-10, higher dispatches earlier).
    pub priority: i64,
    /// Number of user-initiated retries/resumes.
    pub retry_count: i64,
    /// Last error message; set only while the job is failed.
    pub error: Option<String>,
    /// Whether voice-over dubbing was requested.
    pub requested_dubbing: bool,
    /// Dubbing target language (BCP-47 primary subtag, e.g. `"ru"`).
    pub target_lang: String,
    /// Use the "lively" voice variant when dubbing.
    pub use_lively_voice: bool,
    /// Fetcher format preset.
    pub format_preset: FormatPreset,
    /// Output container format.
    pub output_container: OutputContainer,
    /// Also fetch subtitles.
    pub download_subtitles: bool,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the job was last updated.
    pub updated_at: DateTime<Utc>,
    /// Set exactly while the job is in a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Whether a user-initiated retry is allowed from the current state.
    pub fn can_retry(&self) -> bool {
        matches!(self.status, JobStatus::Failed | JobStatus::Canceled)
    }
}

/// Data required to create a new job, with option defaults already applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    /// Source video URL.
    pub url: String,
    /// Dispatch priority (0-10).
    pub priority: i64,
    /// Whether voice-over dubbing was requested.
    pub requested_dubbing: bool,
    /// Dubbing target language.
    pub target_lang: String,
    /// Use the "lively" voice variant.
    pub use_lively_voice: bool,
    /// Fetcher format preset.
    pub format_preset: FormatPreset,
    /// Output container format.
    pub output_container: OutputContainer,
    /// Also fetch subtitles.
    pub download_subtitles: bool,
}
