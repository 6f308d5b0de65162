//! Download stage worker.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use redub_bus::LogLevel;
use redub_entity::job::payload::{DownloadParams, DubParams, MuxParams};
use redub_entity::job::status::JobStatus;
use redub_entity::media::MediaPatch;
use redub_queue::{QueueEntry, QueueName, StageWorker, WorkerError};

use crate::capability::VideoFetcher;
use crate::context::WorkerContext;
use crate::files;

/// Consumes the download queue: fetches the video, publishes metadata,
/// and chains the dub or mux stage.
#[derive(Debug)]
pub struct DownloadWorker {
    ctx: Arc<WorkerContext>,
    fetcher: Arc<dyn VideoFetcher>,
}

impl DownloadWorker {
    /// Create a download worker over a fetcher capability.
    pub fn new(ctx: Arc<WorkerContext>, fetcher: Arc<dyn VideoFetcher>) -> Self {
        Self { ctx, fetcher }
    }
}

#[async_trait]
impl StageWorker for DownloadWorker {
    fn queue(&self) -> QueueName {
        QueueName::Download
    }

    async fn execute(&self, entry: &QueueEntry) -> Result<(), WorkerError> {
        let params: DownloadParams = entry.decode().map_err(|e| {
            let err = WorkerError::permanent("BAD_PAYLOAD", format!("invalid download payload: {e}"));
            self.ctx
                .bus
                .publish_error(entry.job_id, err.code.clone(), err.message.clone(), false, None);
            err
        })?;
        let job_id = params.job_id;

        if self.ctx.job_gone_or_canceled(job_id).await? {
            info!(job_id = %job_id, "Job canceled before download, skipping");
            return Ok(());
        }

        self.ctx
            .bus
            .publish_state_change(job_id, JobStatus::Queued, JobStatus::Downloading);
        self.ctx
            .bus
            .publish_log(job_id, LogLevel::Info, format!("Starting download: {}", params.url));

        let fetched = match self.fetcher.fetch(&params, &self.ctx.bus).await {
            Ok(fetched) => fetched,
            Err(err) => {
                self.ctx.bus.publish_error(
                    job_id,
                    err.code.clone(),
                    err.message.clone(),
                    err.retryable,
                    None,
                );
                return Err(err);
            }
        };

        if self.ctx.job_gone_or_canceled(job_id).await? {
            info!(job_id = %job_id, "Job canceled during download, discarding result");
            files::cleanup_temp_dir(&params.temp_dir).await;
            return Ok(());
        }

        let file_size = tokio::fs::metadata(&fetched.video_path)
            .await
            .ok()
            .map(|m| m.len() as i64);
        let meta = fetched.metadata;

        self.ctx.bus.publish_metadata(
            job_id,
            MediaPatch {
                video_path: Some(fetched.video_path.to_string_lossy().into_owned()),
                temp_dir: Some(params.temp_dir.to_string_lossy().into_owned()),
                file_size_bytes: file_size,
                duration_sec: meta.duration_sec,
                width: meta.width,
                height: meta.height,
                fps: meta.fps,
                video_codec: meta.video_codec.clone(),
                audio_codec: meta.audio_codec.clone(),
                source_id: meta.source_id.clone(),
                source_title: meta.source_title.clone(),
                source_uploader: meta.source_uploader.clone(),
                source_upload_date: meta.source_upload_date.clone(),
                source_description: meta.source_description.clone(),
                source_thumbnail_url: meta.source_thumbnail_url.clone(),
                ..Default::default()
            },
        );

        self.ctx
            .bus
            .publish_state_change(job_id, JobStatus::Downloading, JobStatus::Downloaded);

        let final_path = self.ctx.final_output_path(
            meta.source_title.as_deref(),
            meta.source_id.as_deref(),
            job_id,
            params.output_container,
        );

        if params.requested_dubbing {
            let dub = DubParams {
                job_id,
                url: params.url.clone(),
                video_path: fetched.video_path.clone(),
                target_lang: params.target_lang.clone(),
                use_lively_voice: params.use_lively_voice,
                temp_dir: params.temp_dir.clone(),
                output_path: params.temp_dir.join("dubbed.wav"),
                final_path,
                output_container: params.output_container,
            };
            self.ctx
                .enqueue_next(QueueName::Dub, job_id, serde_json::to_value(&dub)?, entry.priority)
                .await?;
        } else {
            let mux = MuxParams {
                job_id,
                video_path: fetched.video_path.clone(),
                audio_dubbed_path: None,
                target_lang: params.target_lang.clone(),
                output_container: params.output_container,
                ducking_level: self.ctx.mux.ducking_level,
                normalization_lufs: self.ctx.mux.normalization_lufs,
                temp_dir: params.temp_dir.clone(),
                final_path,
            };
            self.ctx
                .enqueue_next(QueueName::Mux, job_id, serde_json::to_value(&mux)?, entry.priority)
                .await?;
        }

        self.ctx.bus.publish_log(
            job_id,
            LogLevel::Info,
            format!(
                "Download complete: {}",
                meta.source_title.as_deref().unwrap_or("untitled")
            ),
        );
        Ok(())
    }
}
