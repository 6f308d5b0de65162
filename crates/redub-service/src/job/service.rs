//! Job service: creation, control operations, retry/resume, deletion.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use redub_core::config::{DownloadConfig, JobDefaults, MediaConfig, MuxConfig};
use redub_core::error::AppError;
use redub_core::result::AppResult;
use redub_core::types::page::PageQuery;
use redub_database::repositories::event::EventRepository;
use redub_database::repositories::job::{JobFilter, JobRepository};
use redub_database::repositories::media::MediaRepository;
use redub_entity::event::{EventKind, JobEvent};
use redub_entity::job::model::{CreateJob, Job};
use redub_entity::job::options::{FormatPreset, OutputContainer};
use redub_entity::job::status::JobStatus;
use redub_entity::media::Media;
use redub_queue::{QueueCoordinator, QueueName};
use redub_realtime::{ServerMessage, SubscriptionGateway};

use super::cleanup::cleanup_job_files;
use super::payloads;
use super::resume::{self, ResumeStage};
use crate::space;

/// Most recent events returned with a job detail read.
const RECENT_EVENTS: u32 = 50;

/// Request to create a job. Omitted options fall back to configured
/// defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateJobRequest {
    /// Source video URL.
    pub url: String,
    /// Request voice-over dubbing.
    pub requested_dubbing: Option<bool>,
    /// Dubbing target language.
    pub target_lang: Option<String>,
    /// Use the "lively" voice variant.
    pub use_lively_voice: Option<bool>,
    /// Fetcher format preset.
    pub format_preset: Option<String>,
    /// Output container.
    pub output_container: Option<String>,
    /// Also fetch subtitles.
    pub download_subtitles: Option<bool>,
    /// Dispatch priority (0-10).
    pub priority: Option<i64>,
    /// Netscape cookies text, written to the job's temp directory.
    pub cookies: Option<String>,
}

/// Control actions on a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Cancel,
    Prioritize,
    Pause,
    Resume,
}

/// A job with its media row and most recent events.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetails {
    #[serde(flatten)]
    pub job: Job,
    pub media: Option<Media>,
    pub recent_events: Vec<JobEvent>,
}

/// The state machine core.
#[derive(Debug, Clone)]
pub struct JobService {
    jobs: Arc<JobRepository>,
    media: Arc<MediaRepository>,
    events: Arc<EventRepository>,
    coordinator: Arc<QueueCoordinator>,
    gateway: Arc<SubscriptionGateway>,
    media_cfg: MediaConfig,
    defaults: JobDefaults,
    download_cfg: DownloadConfig,
    mux_cfg: MuxConfig,
}

impl JobService {
    /// Create the job service.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        jobs: Arc<JobRepository>,
        media: Arc<MediaRepository>,
        events: Arc<EventRepository>,
        coordinator: Arc<QueueCoordinator>,
        gateway: Arc<SubscriptionGateway>,
        media_cfg: MediaConfig,
        defaults: JobDefaults,
        download_cfg: DownloadConfig,
        mux_cfg: MuxConfig,
    ) -> Self {
        Self {
            jobs,
            media,
            events,
            coordinator,
            gateway,
            media_cfg,
            defaults,
            download_cfg,
            mux_cfg,
        }
    }

    /// Create a job: validate, check disk space, persist atomically,
    /// enqueue the download, and announce it.
    #[instrument(skip(self, request), fields(url = %request.url))]
    pub async fn create(&self, request: CreateJobRequest) -> AppResult<Job> {
        let data = self.validate_request(&request)?;
        self.check_free_space()?;

        let job = self.jobs.create_atomic(&data).await?;
        info!(job_id = %job.id, "Job created");

        if let Some(cookies) = request.cookies.as_deref().filter(|c| !c.trim().is_empty()) {
            self.write_cookies_file(job.id, cookies).await?;
        }

        let params = payloads::download_params(&job, &self.media_cfg, &self.download_cfg);
        self.coordinator
            .enqueue(
                QueueName::Download,
                job.id,
                serde_json::to_value(&params)?,
                job.priority,
            )
            .await?;

        self.gateway
            .broadcast_all(ServerMessage::job_added(serde_json::to_value(&job)?))
            .await;

        Ok(job)
    }

    /// Fetch a job with media and recent events.
    pub async fn get(&self, id: Uuid) -> AppResult<JobDetails> {
        let job = self.require_job(id).await?;
        let media = self.media.get(id).await?;
        let (recent_events, _) = self
            .events
            .list(id, &PageQuery::new(RECENT_EVENTS, 0))
            .await?;
        Ok(JobDetails {
            job,
            media,
            recent_events,
        })
    }

    /// List jobs with filtering and pagination.
    pub async fn list(&self, filter: &JobFilter, page: &PageQuery) -> AppResult<(Vec<Job>, u64)> {
        self.jobs.list(filter, page).await
    }

    /// Paginated event log for a job, newest first.
    pub async fn logs(&self, id: Uuid, page: &PageQuery) -> AppResult<(Vec<JobEvent>, u64)> {
        self.require_job(id).await?;
        self.events.list(id, page).await
    }

    /// Cancel a job: record the transition, clear its queue entries, and
    /// clean the filesystem. Double-cancel returns the canceled job
    /// unchanged.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: Uuid) -> AppResult<Job> {
        let job = self.require_job(id).await?;

        if job.status == JobStatus::Canceled {
            return Ok(job);
        }
        if job.status.is_terminal() {
            return Err(AppError::invalid_state(format!(
                "Cannot cancel a job in state {}",
                job.status
            )));
        }

        self.apply_transition(id, job.status, JobStatus::Canceled)
            .await?;
        self.coordinator.remove_everywhere(id).await?;

        let media = self.media.get(id).await?;
        cleanup_job_files(&self.media_cfg, id, media.as_ref()).await;

        info!(job_id = %id, from = %job.status, "Job canceled");
        self.require_job(id).await
    }

    /// Dispatch a control action.
    pub async fn control(
        &self,
        id: Uuid,
        action: ControlAction,
        priority: Option<i64>,
    ) -> AppResult<Job> {
        match action {
            ControlAction::Cancel => self.cancel(id).await,
            ControlAction::Prioritize => {
                let priority = priority.ok_or_else(|| {
                    AppError::validation("prioritize requires a priority value")
                })?;
                self.prioritize(id, priority).await
            }
            ControlAction::Pause | ControlAction::Resume => Err(AppError::not_implemented(
                "pause/resume control actions are reserved",
            )),
        }
    }

    /// Update the persisted priority and reshuffle waiting queue entries.
    pub async fn prioritize(&self, id: Uuid, priority: i64) -> AppResult<Job> {
        validate_priority(priority)?;
        self.require_job(id).await?;
        self.jobs.update_priority(id, priority).await?;
        self.coordinator.update_priority(id, priority).await?;
        self.require_job(id).await
    }

    /// Retry a failed or canceled job from the download stage with a
    /// fresh queue lineage.
    #[instrument(skip(self))]
    pub async fn retry(&self, id: Uuid) -> AppResult<Job> {
        let job = self.require_job(id).await?;
        if !job.can_retry() {
            return Err(AppError::invalid_state(format!(
                "Cannot retry a job in state {}",
                job.status
            )));
        }

        self.events
            .append(
                id,
                EventKind::Retry,
                serde_json::json!({ "previousStatus": job.status.as_str() }),
            )
            .await?;
        self.jobs.update_status(id, JobStatus::Queued, None).await?;
        self.jobs.increment_retry(id).await?;

        let job = self.require_job(id).await?;
        let params = payloads::download_params(&job, &self.media_cfg, &self.download_cfg);
        self.coordinator
            .enqueue(
                QueueName::Download,
                id,
                serde_json::to_value(&params)?,
                job.priority,
            )
            .await?;

        info!(job_id = %id, "Job retried from the download stage");
        Ok(job)
    }

    /// Resume a failed job at the last recoverable stage.
    #[instrument(skip(self))]
    pub async fn resume(&self, id: Uuid) -> AppResult<(Job, ResumeStage)> {
        let job = self.require_job(id).await?;
        if job.status != JobStatus::Failed {
            return Err(AppError::invalid_state(format!(
                "Cannot resume a job in state {}",
                job.status
            )));
        }

        let history = self.events.history(id).await?;
        let media = self.media.get(id).await?;

        let (stage, _diag) = resume::plan(&job, &history, media.as_ref()).map_err(|diag| {
            AppError::cannot_resume("No completed stage is recoverable")
                .with_details(serde_json::to_value(diag).unwrap_or(serde_json::Value::Null))
        })?;

        // Both resumable branches require filesystem evidence recorded on
        // the media row, so it must exist here.
        let Some(media) = media else {
            return Err(AppError::internal("Resume accepted without a media row"));
        };
        self.events
            .append(
                id,
                EventKind::Retry,
                serde_json::json!({
                    "previousStatus": job.status.as_str(),
                    "resumeFrom": stage.as_str(),
                }),
            )
            .await?;

        match stage {
            ResumeStage::Dubbing => {
                self.jobs
                    .update_status(id, JobStatus::Downloaded, None)
                    .await?;
                let params = payloads::dub_params(&job, &media, &self.media_cfg);
                self.coordinator
                    .enqueue(QueueName::Dub, id, serde_json::to_value(&params)?, job.priority)
                    .await?;
            }
            ResumeStage::Muxing => {
                self.jobs.update_status(id, JobStatus::Dubbed, None).await?;
                let params =
                    payloads::mux_params(&job, &media, &self.media_cfg, &self.mux_cfg);
                self.coordinator
                    .enqueue(QueueName::Mux, id, serde_json::to_value(&params)?, job.priority)
                    .await?;
            }
        }
        self.jobs.increment_retry(id).await?;

        info!(job_id = %id, stage = stage.as_str(), "Job resumed");
        Ok((self.require_job(id).await?, stage))
    }

    /// Delete a job: clean the filesystem first, then cascade the rows.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let job = self.require_job(id).await?;
        let media = self.media.get(id).await?;

        self.coordinator.remove_everywhere(id).await?;
        cleanup_job_files(&self.media_cfg, id, media.as_ref()).await;
        self.jobs.delete(id).await?;

        self.gateway
            .broadcast_all(ServerMessage::job_removed(id))
            .await;
        info!(job_id = %id, status = %job.status, "Job deleted");
        Ok(())
    }

    /// Append the `state_change` event and persist the new state; pushed
    /// to the job's room so subscribers observe service-driven
    /// transitions too.
    async fn apply_transition(&self, id: Uuid, from: JobStatus, to: JobStatus) -> AppResult<()> {
        self.jobs.record_transition(id, from, to, None).await?;

        self.gateway
            .forward_to_room(
                id,
                ServerMessage {
                    job_id: Some(id),
                    message_type: "state_change".to_string(),
                    timestamp: chrono::Utc::now(),
                    payload: serde_json::json!({ "from": from.as_str(), "to": to.as_str() }),
                },
            )
            .await;
        Ok(())
    }

    async fn require_job(&self, id: Uuid) -> AppResult<Job> {
        self.jobs
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Job {id} not found")))
    }

    /// Normalize defaults and validate the creation request.
    fn validate_request(&self, request: &CreateJobRequest) -> AppResult<CreateJob> {
        validate_url(&request.url)?;

        let priority = request.priority.unwrap_or(0);
        validate_priority(priority)?;

        let format_preset = match request.format_preset.as_deref() {
            Some(raw) => FormatPreset::parse(raw).ok_or_else(|| {
                AppError::validation(format!("Unknown format preset: {raw}"))
                    .with_details(serde_json::json!({ "field": "formatPreset" }))
            })?,
            None => FormatPreset::parse(&self.defaults.default_format_preset)
                .unwrap_or(FormatPreset::BestVideoAudio),
        };

        let output_container = match request.output_container.as_deref() {
            Some(raw) => OutputContainer::parse(raw).ok_or_else(|| {
                AppError::validation(format!("Unknown output container: {raw}"))
                    .with_details(serde_json::json!({ "field": "outputContainer" }))
            })?,
            None => OutputContainer::parse(&self.defaults.default_container)
                .unwrap_or(OutputContainer::Mkv),
        };

        let target_lang = request
            .target_lang
            .clone()
            .unwrap_or_else(|| self.defaults.default_target_lang.clone());
        if target_lang.is_empty() || target_lang.len() > 8 {
            return Err(AppError::validation("Invalid target language")
                .with_details(serde_json::json!({ "field": "targetLang" })));
        }

        Ok(CreateJob {
            url: request.url.trim().to_string(),
            priority,
            requested_dubbing: request.requested_dubbing.unwrap_or(false),
            target_lang,
            use_lively_voice: request.use_lively_voice.unwrap_or(false),
            format_preset,
            output_container,
            download_subtitles: request.download_subtitles.unwrap_or(false),
        })
    }

    /// Reject creation when the media root is below the free-space floor.
    fn check_free_space(&self) -> AppResult<()> {
        let min = self.media_cfg.min_free_space_gb;
        if min == 0 {
            return Ok(());
        }
        let root = std::path::Path::new(&self.media_cfg.root);
        match space::available_bytes(root) {
            Some(free) if free < min.saturating_mul(1024 * 1024 * 1024) => {
                Err(AppError::insufficient_space(format!(
                    "Free space below the configured minimum of {min} GiB"
                )))
            }
            Some(_) => Ok(()),
            None => {
                warn!(root = %self.media_cfg.root, "Could not determine free space");
                Ok(())
            }
        }
    }

    /// Write the request's cookies into the job's temp directory.
    async fn write_cookies_file(&self, job_id: Uuid, cookies: &str) -> AppResult<()> {
        let temp_dir = self.media_cfg.incomplete_dir(&job_id.to_string());
        tokio::fs::create_dir_all(&temp_dir).await?;
        tokio::fs::write(temp_dir.join("cookies.txt"), cookies).await?;
        Ok(())
    }
}

/// Minimal URL syntax check: http(s) scheme and a non-empty host.
fn validate_url(url: &str) -> AppResult<()> {
    let trimmed = url.trim();
    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .ok_or_else(|| {
            AppError::validation("URL must use the http or https scheme")
                .with_details(serde_json::json!({ "field": "url" }))
        })?;
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() || host.contains(char::is_whitespace) {
        return Err(AppError::validation("URL has no valid host")
            .with_details(serde_json::json!({ "field": "url" })));
    }
    Ok(())
}

/// Priority must lie in 0-10.
fn validate_priority(priority: i64) -> AppResult<()> {
    if (0..=10).contains(&priority) {
        Ok(())
    } else {
        Err(AppError::validation("Priority must be between 0 and 10")
            .with_details(serde_json::json!({ "field": "priority" })))
    }
}
