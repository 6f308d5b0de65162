//! Filesystem cleanup on cancel and delete.
//!
//! The job service removes files before touching persistence; the store
//! never deletes from disk.

use std::path::Path;

use tracing::{debug, warn};
use uuid::Uuid;

use redub_core::config::MediaConfig;
use redub_entity::media::Media;

/// Remove a job's work-in-progress directory and any recorded outputs.
pub async fn cleanup_job_files(config: &MediaConfig, job_id: Uuid, media: Option<&Media>) {
    let temp_dir = config.incomplete_dir(&job_id.to_string());
    remove_dir(&temp_dir).await;

    if let Some(media) = media {
        // A temp dir recorded under a different path than the convention.
        if let Some(dir) = media.temp_dir.as_deref() {
            remove_dir(Path::new(dir)).await;
        }
        for path in [
            media.video_path.as_deref(),
            media.audio_original_path.as_deref(),
            media.audio_dubbed_path.as_deref(),
            media.audio_mixed_path.as_deref(),
        ]
        .into_iter()
        .flatten()
        {
            remove_file(Path::new(path)).await;
        }
    }
}

async fn remove_dir(path: &Path) {
    if path.is_dir() {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => debug!(path = %path.display(), "Removed directory"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove directory"),
        }
    }
}

async fn remove_file(path: &Path) {
    if path.is_file() {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "Removed file"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove file"),
        }
    }
}
