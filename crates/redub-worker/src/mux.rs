//! Mux stage worker.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use redub_bus::{LogLevel, ProgressPayload, Stage};
use redub_entity::job::payload::MuxParams;
use redub_entity::job::status::JobStatus;
use redub_entity::media::MediaPatch;
use redub_queue::{QueueEntry, QueueName, StageWorker, WorkerError};

use crate::capability::TrackMuxer;
use crate::context::WorkerContext;
use crate::files;

/// Consumes the mux queue: mixes the dubbed track (when present), muxes
/// the final container, and moves it into the complete directory.
#[derive(Debug)]
pub struct MuxWorker {
    ctx: Arc<WorkerContext>,
    muxer: Arc<dyn TrackMuxer>,
}

impl MuxWorker {
    /// Create a mux worker over a muxer capability.
    pub fn new(ctx: Arc<WorkerContext>, muxer: Arc<dyn TrackMuxer>) -> Self {
        Self { ctx, muxer }
    }
}

#[async_trait]
impl StageWorker for MuxWorker {
    fn queue(&self) -> QueueName {
        QueueName::Mux
    }

    async fn execute(&self, entry: &QueueEntry) -> Result<(), WorkerError> {
        let params: MuxParams = entry.decode().map_err(|e| {
            let err = WorkerError::permanent("BAD_PAYLOAD", format!("invalid mux payload: {e}"));
            self.ctx
                .bus
                .publish_error(entry.job_id, err.code.clone(), err.message.clone(), false, None);
            err
        })?;
        let job_id = params.job_id;

        if self.ctx.job_gone_or_canceled(job_id).await? {
            info!(job_id = %job_id, "Job canceled before muxing, skipping");
            return Ok(());
        }

        if !params.video_path.exists() {
            let err = WorkerError::permanent(
                "MISSING_INPUT",
                format!("video file not found: {}", params.video_path.display()),
            );
            self.ctx
                .bus
                .publish_error(job_id, err.code.clone(), err.message.clone(), false, None);
            return Err(err);
        }
        if let Some(dubbed) = &params.audio_dubbed_path {
            if !dubbed.exists() {
                let err = WorkerError::permanent(
                    "MISSING_INPUT",
                    format!("dubbed audio not found: {}", dubbed.display()),
                );
                self.ctx
                    .bus
                    .publish_error(job_id, err.code.clone(), err.message.clone(), false, None);
                return Err(err);
            }
        }

        // Muxing is entered from `dubbed` on the dubbing path and from
        // `downloaded` when dubbing was skipped.
        let from = if params.audio_dubbed_path.is_some() {
            JobStatus::Dubbed
        } else {
            JobStatus::Downloaded
        };
        self.ctx.bus.publish_state_change(job_id, from, JobStatus::Muxing);
        self.ctx
            .bus
            .publish_log(job_id, LogLevel::Info, "Starting audio mixing and muxing");

        let temp_output = match self.muxer.mux(&params, &self.ctx.bus).await {
            Ok(path) => path,
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
            info!(job_id = %job_id, "Job canceled during muxing, discarding result");
            files::cleanup_temp_dir(&params.temp_dir).await;
            return Ok(());
        }

        // Re-derive the title-based name from the media row and resolve
        // collisions at move time.
        let media = self.ctx.media_repo.get(job_id).await?;
        let ext = params.output_container.as_str();
        let final_path = match media.as_ref().and_then(|m| m.source_title.as_deref()) {
            Some(title) => {
                let source_id = media
                    .as_ref()
                    .and_then(|m| m.source_id.clone())
                    .unwrap_or_else(|| job_id.to_string());
                files::unique_final_path(&self.ctx.media.complete_dir(), title, &source_id, ext)
            }
            None => params.final_path.clone(),
        };

        if let Err(e) = files::move_into_place(&temp_output, &final_path).await {
            let err = WorkerError::permanent(
                "MUX_ERROR",
                format!("failed to move output into place: {e}"),
            );
            self.ctx
                .bus
                .publish_error(job_id, err.code.clone(), err.message.clone(), false, None);
            return Err(err);
        }

        files::cleanup_temp_dir(&params.temp_dir).await;

        self.ctx.bus.publish_progress(
            job_id,
            ProgressPayload {
                stage: Stage::Muxing,
                percent: 100.0,
                downloaded_bytes: None,
                total_bytes: None,
                speed: None,
                eta: None,
            },
        );

        let file_size = tokio::fs::metadata(&final_path)
            .await
            .ok()
            .map(|m| m.len() as i64);
        self.ctx.bus.publish_metadata(
            job_id,
            MediaPatch {
                video_path: Some(final_path.to_string_lossy().into_owned()),
                file_size_bytes: file_size,
                temp_dir: None,
                ..Default::default()
            },
        );

        self.ctx
            .bus
            .publish_state_change(job_id, JobStatus::Muxing, JobStatus::Complete);
        self.ctx
            .bus
            .publish_log(job_id, LogLevel::Info, "Muxing complete");
        Ok(())
    }
}
