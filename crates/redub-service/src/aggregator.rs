//! Event aggregator: the single consumer of the bus firehose.
//!
//! For every inbound message it updates persistence as the channel
//! demands and fans the message out to the job's subscribers. Store
//! writes never depend on whether anyone is connected.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use redub_bus::{ErrorPayload, EventMessage, EventPayload, StateChangePayload};
use redub_core::result::AppResult;
use redub_database::repositories::event::EventRepository;
use redub_database::repositories::job::JobRepository;
use redub_database::repositories::media::MediaRepository;
use redub_entity::event::EventKind;
use redub_entity::job::status::JobStatus;
use redub_realtime::{ServerMessage, SubscriptionGateway};

/// Long-lived subscriber to all five bus channels.
#[derive(Debug)]
pub struct EventAggregator {
    jobs: Arc<JobRepository>,
    media: Arc<MediaRepository>,
    events: Arc<EventRepository>,
    gateway: Arc<SubscriptionGateway>,
}

impl EventAggregator {
    /// Create the aggregator.
    pub fn new(
        jobs: Arc<JobRepository>,
        media: Arc<MediaRepository>,
        events: Arc<EventRepository>,
        gateway: Arc<SubscriptionGateway>,
    ) -> Self {
        Self {
            jobs,
            media,
            events,
            gateway,
        }
    }

    /// Consume the firehose until shutdown. Messages for one job are
    /// applied in publish order; a lagged receiver drops the oldest
    /// messages and keeps going.
    pub async fn run(
        &self,
        mut rx: broadcast::Receiver<EventMessage>,
        mut cancel: watch::Receiver<bool>,
    ) {
        info!("Event aggregator started");
        loop {
            tokio::select! {
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        break;
                    }
                }
                received = rx.recv() => match received {
                    Ok(message) => {
                        if let Err(e) = self.handle(message).await {
                            error!(error = %e, "Failed to apply bus message");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(dropped)) => {
                        warn!(dropped, "Aggregator lagged behind the bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        info!("Event aggregator stopped");
    }

    /// Apply one message.
    pub async fn handle(&self, message: EventMessage) -> AppResult<()> {
        let job_id = message.job_id;
        match &message.payload {
            EventPayload::Progress(_) => {
                self.forward(&message).await;
            }
            EventPayload::StateChange(change) => {
                self.apply_state_change(&message, change).await?;
                self.forward(&message).await;
            }
            EventPayload::Log(_) => {
                self.events
                    .append(job_id, EventKind::Log, message.payload.to_json())
                    .await?;
                self.forward(&message).await;
            }
            EventPayload::Error(error) => {
                self.events
                    .append(job_id, EventKind::Error, message.payload.to_json())
                    .await?;
                if !error.retryable {
                    self.fail_job(&message, error).await?;
                }
                self.forward(&message).await;
            }
            EventPayload::Metadata(patch) => {
                self.media.apply_patch(job_id, patch).await?;
            }
        }
        Ok(())
    }

    /// Apply a worker-reported state change. Transitions are applied as
    /// received, with one guard: a canceled job stays canceled, so a
    /// worker finishing after cancellation cannot resurrect it (the
    /// event row is still written for the audit trail).
    async fn apply_state_change(
        &self,
        message: &EventMessage,
        change: &StateChangePayload,
    ) -> AppResult<()> {
        let Some(job) = self.jobs.find_by_id(message.job_id).await? else {
            debug!(job_id = %message.job_id, "State change for a deleted job, ignoring");
            return Ok(());
        };
        if job.status == JobStatus::Canceled && change.to != JobStatus::Canceled {
            debug!(
                job_id = %message.job_id,
                to = %change.to,
                "Job already canceled, recording the event without applying it"
            );
            self.events
                .append(message.job_id, EventKind::StateChange, message.payload.to_json())
                .await?;
            return Ok(());
        }

        self.jobs
            .record_transition(message.job_id, change.from, change.to, None)
            .await?;

        if change.to.is_terminal() {
            self.events
                .append(
                    message.job_id,
                    EventKind::Finished,
                    serde_json::json!({ "status": change.to.as_str() }),
                )
                .await?;
        }
        Ok(())
    }

    /// A non-retryable error fails the job: record the transition, set
    /// the error message, and push the state change to subscribers.
    async fn fail_job(&self, message: &EventMessage, error: &ErrorPayload) -> AppResult<()> {
        let Some(job) = self.jobs.find_by_id(message.job_id).await? else {
            return Ok(());
        };
        if job.status.is_terminal() {
            return Ok(());
        }

        let change = StateChangePayload {
            from: job.status,
            to: JobStatus::Failed,
        };
        self.jobs
            .record_transition(message.job_id, change.from, change.to, Some(&error.message))
            .await?;
        self.events
            .append(
                message.job_id,
                EventKind::Finished,
                serde_json::json!({ "status": JobStatus::Failed.as_str() }),
            )
            .await?;

        self.forward(&EventMessage::new(
            message.job_id,
            EventPayload::StateChange(change),
        ))
        .await;
        Ok(())
    }

    async fn forward(&self, message: &EventMessage) {
        self.gateway
            .forward_to_room(message.job_id, ServerMessage::from_event(message))
            .await;
    }
}
