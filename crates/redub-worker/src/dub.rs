//! Dub stage worker.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use redub_bus::LogLevel;
use redub_entity::job::payload::{DubParams, MuxParams};
use redub_entity::job::status::JobStatus;
use redub_entity::media::MediaPatch;
use redub_queue::{QueueEntry, QueueName, StageWorker, WorkerError};

use crate::capability::VoiceDubber;
use crate::context::WorkerContext;
use crate::files;

/// Consumes the dub queue: produces the dubbed audio track and chains
/// the mux stage.
#[derive(Debug)]
pub struct DubWorker {
    ctx: Arc<WorkerContext>,
    dubber: Arc<dyn VoiceDubber>,
}

impl DubWorker {
    /// Create a dub worker over a dubber capability.
    pub fn new(ctx: Arc<WorkerContext>, dubber: Arc<dyn VoiceDubber>) -> Self {
        Self { ctx, dubber }
    }
}

#[async_trait]
impl StageWorker for DubWorker {
    fn queue(&self) -> QueueName {
        QueueName::Dub
    }

    async fn execute(&self, entry: &QueueEntry) -> Result<(), WorkerError> {
        let params: DubParams = entry.decode().map_err(|e| {
            let err = WorkerError::permanent("BAD_PAYLOAD", format!("invalid dub payload: {e}"));
            self.ctx
                .bus
                .publish_error(entry.job_id, err.code.clone(), err.message.clone(), false, None);
            err
        })?;
        let job_id = params.job_id;

        if self.ctx.job_gone_or_canceled(job_id).await? {
            info!(job_id = %job_id, "Job canceled before dubbing, skipping");
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

        self.ctx
            .bus
            .publish_state_change(job_id, JobStatus::Downloaded, JobStatus::Dubbing);
        self.ctx.bus.publish_log(
            job_id,
            LogLevel::Info,
            format!("Requesting voice-over translation to {}", params.target_lang),
        );

        let dubbed_path = match self.dubber.dub(&params, &self.ctx.bus).await {
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
            info!(job_id = %job_id, "Job canceled during dubbing, discarding result");
            files::cleanup_temp_dir(&params.temp_dir).await;
            return Ok(());
        }

        self.ctx.bus.publish_metadata(
            job_id,
            MediaPatch {
                audio_dubbed_path: Some(dubbed_path.to_string_lossy().into_owned()),
                ..Default::default()
            },
        );

        self.ctx
            .bus
            .publish_state_change(job_id, JobStatus::Dubbing, JobStatus::Dubbed);

        let mux = MuxParams {
            job_id,
            video_path: params.video_path.clone(),
            audio_dubbed_path: Some(dubbed_path),
            target_lang: params.target_lang.clone(),
            output_container: params.output_container,
            ducking_level: self.ctx.mux.ducking_level,
            normalization_lufs: self.ctx.mux.normalization_lufs,
            temp_dir: params.temp_dir.clone(),
            final_path: params.final_path.clone(),
        };
        self.ctx
            .enqueue_next(QueueName::Mux, job_id, serde_json::to_value(&mux)?, entry.priority)
            .await?;

        self.ctx
            .bus
            .publish_log(job_id, LogLevel::Info, "Dubbing complete");
        Ok(())
    }
}
