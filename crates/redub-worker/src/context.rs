//! Shared dependencies and helpers for the stage workers.

use std::path::PathBuf;
use std::sync::Arc;

use uuid::Uuid;

use redub_bus::EventBus;
use redub_core::config::{MediaConfig, MuxConfig};
use redub_core::result::AppResult;
use redub_database::repositories::job::JobRepository;
use redub_database::repositories::media::MediaRepository;
use redub_entity::job::options::OutputContainer;
use redub_entity::job::status::JobStatus;
use redub_queue::{QueueName, QueueStore};

use crate::files;

/// Everything a stage worker needs besides its capability.
#[derive(Debug)]
pub struct WorkerContext {
    /// Event bus for progress/state/log/error/metadata publication.
    pub bus: Arc<EventBus>,
    /// Job rows, read for cancellation detection and transition sources.
    pub jobs: Arc<JobRepository>,
    /// Media rows, read for title-based final naming.
    pub media_repo: Arc<MediaRepository>,
    /// Durable queue state, written to chain the next stage.
    pub queue: Arc<QueueStore>,
    /// Filesystem layout.
    pub media: MediaConfig,
    /// Mux-stage mixing defaults.
    pub mux: MuxConfig,
    queue_config: redub_core::config::QueueConfig,
}

impl WorkerContext {
    /// Bundle worker dependencies.
    pub fn new(
        bus: Arc<EventBus>,
        jobs: Arc<JobRepository>,
        media_repo: Arc<MediaRepository>,
        queue: Arc<QueueStore>,
        media: MediaConfig,
        mux: MuxConfig,
        queue_config: redub_core::config::QueueConfig,
    ) -> Self {
        Self {
            bus,
            jobs,
            media_repo,
            queue,
            media,
            mux,
            queue_config,
        }
    }

    /// Workers poll the job row at suspension points; a deleted or
    /// canceled job means the stage aborts quietly and cleanup owns any
    /// leftover artifacts.
    pub async fn job_gone_or_canceled(&self, job_id: Uuid) -> AppResult<bool> {
        Ok(match self.jobs.find_by_id(job_id).await? {
            Some(job) => job.status == JobStatus::Canceled,
            None => true,
        })
    }

    /// Enqueue the next stage with the target queue's retry parameters.
    pub async fn enqueue_next(
        &self,
        queue: QueueName,
        job_id: Uuid,
        payload: serde_json::Value,
        priority: i64,
    ) -> AppResult<()> {
        let spec = redub_queue::QueueSpec::for_queue(queue, &self.queue_config);
        self.queue.enqueue(&spec, job_id, payload, priority).await
    }

    /// Title-based final output path, falling back to the job id when no
    /// title is known. Uniqueness is resolved at move time.
    pub fn final_output_path(
        &self,
        source_title: Option<&str>,
        source_id: Option<&str>,
        job_id: Uuid,
        container: OutputContainer,
    ) -> PathBuf {
        let dir = self.media.complete_dir();
        match source_title {
            Some(title) => {
                let id = source_id
                    .map(str::to_owned)
                    .unwrap_or_else(|| job_id.to_string());
                dir.join(format!(
                    "{} [{}].{}",
                    files::sanitize_filename(title),
                    id,
                    container.as_str()
                ))
            }
            None => dir.join(format!("{job_id}.{}", container.as_str())),
        }
    }
}
