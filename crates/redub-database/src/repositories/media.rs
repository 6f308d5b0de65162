//! Media repository: reads and partial patches.

use uuid::Uuid;

use redub_core::error::{AppError, ErrorKind};
use redub_core::result::AppResult;
use redub_entity::media::{Media, MediaPatch};

use crate::connection::Store;

/// Repository for media rows.
#[derive(Debug, Clone)]
pub struct MediaRepository {
    store: Store,
}

impl MediaRepository {
    /// Create a new media repository.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Fetch the media row for a job.
    pub async fn get(&self, job_id: Uuid) -> AppResult<Option<Media>> {
        sqlx::query_as::<_, Media>("SELECT * FROM media WHERE job_id = ?1")
            .bind(job_id.to_string())
            .fetch_optional(self.store.reader())
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to fetch media", e))
    }

    /// Apply a partial update. Fields absent from the patch keep their
    /// current value.
    pub async fn apply_patch(&self, job_id: Uuid, patch: &MediaPatch) -> AppResult<()> {
        if patch.is_empty() {
            return Ok(());
        }

        sqlx::query(
            "UPDATE media SET \
             video_path = COALESCE(?2, video_path), \
             audio_original_path = COALESCE(?3, audio_original_path), \
             audio_dubbed_path = COALESCE(?4, audio_dubbed_path), \
             audio_mixed_path = COALESCE(?5, audio_mixed_path), \
             temp_dir = COALESCE(?6, temp_dir), \
             duration_sec = COALESCE(?7, duration_sec), \
             width = COALESCE(?8, width), \
             height = COALESCE(?9, height), \
             fps = COALESCE(?10, fps), \
             video_codec = COALESCE(?11, video_codec), \
             audio_codec = COALESCE(?12, audio_codec), \
             file_size_bytes = COALESCE(?13, file_size_bytes), \
             source_id = COALESCE(?14, source_id), \
             source_title = COALESCE(?15, source_title), \
             source_uploader = COALESCE(?16, source_uploader), \
             source_upload_date = COALESCE(?17, source_upload_date), \
             source_description = COALESCE(?18, source_description), \
             source_thumbnail_url = COALESCE(?19, source_thumbnail_url) \
             WHERE job_id = ?1",
        )
        .bind(job_id.to_string())
        .bind(&patch.video_path)
        .bind(&patch.audio_original_path)
        .bind(&patch.audio_dubbed_path)
        .bind(&patch.audio_mixed_path)
        .bind(&patch.temp_dir)
        .bind(patch.duration_sec)
        .bind(patch.width)
        .bind(patch.height)
        .bind(patch.fps)
        .bind(&patch.video_codec)
        .bind(&patch.audio_codec)
        .bind(patch.file_size_bytes)
        .bind(&patch.source_id)
        .bind(&patch.source_title)
        .bind(&patch.source_uploader)
        .bind(&patch.source_upload_date)
        .bind(&patch.source_description)
        .bind(&patch.source_thumbnail_url)
        .execute(self.store.writer())
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to patch media", e))?;

        Ok(())
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
    async fn patch_is_partial() {
        let (_dir, store) = temp_store().await;
        let jobs = JobRepository::new(store.clone());
        let media = MediaRepository::new(store);

        let job = jobs
            .create_atomic(&CreateJob {
                url: "https://example.test/v1".into(),
                priority: 0,
                requested_dubbing: true,
                target_lang: "ru".into(),
                use_lively_voice: false,
                format_preset: FormatPreset::Best,
                output_container: OutputContainer::Mp4,
                download_subtitles: false,
            })
            .await
            .unwrap();

        media
            .apply_patch(
                job.id,
                &MediaPatch {
                    source_title: Some("Some Video".into()),
                    video_path: Some("/m/incomplete/x/v.mp4".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        media
            .apply_patch(
                job.id,
                &MediaPatch {
                    audio_dubbed_path: Some("/m/incomplete/x/dubbed.wav".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let row = media.get(job.id).await.unwrap().unwrap();
        assert_eq!(row.source_title.as_deref(), Some("Some Video"));
        assert_eq!(row.video_path.as_deref(), Some("/m/incomplete/x/v.mp4"));
        assert_eq!(
            row.audio_dubbed_path.as_deref(),
            Some("/m/incomplete/x/dubbed.wav")
        );
    }
}
