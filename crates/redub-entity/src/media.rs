//! Media entity: per-job file paths and source metadata.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Media row, created empty alongside its job and filled incrementally
/// by worker metadata events. At most one per job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    /// Owning job.
    #[serde(default)]
    pub job_id: Uuid,
    /// Downloaded (and, after muxing, final) video file.
    pub video_path: Option<String>,
    /// Extracted original audio track.
    pub audio_original_path: Option<String>,
    /// Dubbed audio track; set only after successful dubbing.
    pub audio_dubbed_path: Option<String>,
    /// Duck-mixed audio track.
    pub audio_mixed_path: Option<String>,
    /// Work-in-progress directory.
    pub temp_dir: Option<String>,
    /// Duration in seconds.
    pub duration_sec: Option<f64>,
    /// Video width in pixels.
    pub width: Option<i64>,
    /// Video height in pixels.
    pub height: Option<i64>,
    /// Frames per second.
    pub fps: Option<f64>,
    /// Video codec name.
    pub video_codec: Option<String>,
    /// Audio codec name.
    pub audio_codec: Option<String>,
    /// Output file size in bytes.
    pub file_size_bytes: Option<i64>,
    /// Source-side video id.
    pub source_id: Option<String>,
    /// Source-side title.
    pub source_title: Option<String>,
    /// Source-side uploader/channel.
    pub source_uploader: Option<String>,
    /// Source-side upload date (as reported, `YYYYMMDD`).
    pub source_upload_date: Option<String>,
    /// Source-side description.
    pub source_description: Option<String>,
    /// Source-side thumbnail URL.
    pub source_thumbnail_url: Option<String>,
}

/// Partial media update carried by a `metadata` bus event.
///
/// Only the fields that are present are written; everything else on the
/// row is left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaPatch {
    pub video_path: Option<String>,
    pub audio_original_path: Option<String>,
    pub audio_dubbed_path: Option<String>,
    pub audio_mixed_path: Option<String>,
    pub temp_dir: Option<String>,
    pub duration_sec: Option<f64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub fps: Option<f64>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub file_size_bytes: Option<i64>,
    pub source_id: Option<String>,
    pub source_title: Option<String>,
    pub source_uploader: Option<String>,
    pub source_upload_date: Option<String>,
    pub source_description: Option<String>,
    pub source_thumbnail_url: Option<String>,
}

impl MediaPatch {
    /// True when the patch carries nothing to write.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
