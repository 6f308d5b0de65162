//! The in-process pub/sub bus.

use std::collections::HashMap;

use tokio::sync::broadcast;
use uuid::Uuid;

use redub_entity::job::status::JobStatus;
use redub_entity::media::MediaPatch;

use crate::message::{
    Channel, ErrorPayload, EventMessage, EventPayload, LogLevel, LogPayload, ProgressPayload,
    StateChangePayload,
};

/// Default per-channel buffer size.
const DEFAULT_BUFFER: usize = 1024;

/// Fan-out pub/sub over the five typed channels.
///
/// Delivery is at-most-once to subscribers alive at publish time; a
/// lagging receiver drops the oldest messages. Durability comes from the
/// aggregator writing to the store, never from the bus.
#[derive(Debug)]
pub struct EventBus {
    channels: HashMap<Channel, broadcast::Sender<EventMessage>>,
    /// Every publish also lands here, preserving global publish order.
    firehose: broadcast::Sender<EventMessage>,
}

impl EventBus {
    /// Create a bus with the default buffer size.
    pub fn new() -> Self {
        Self::with_buffer(DEFAULT_BUFFER)
    }

    /// Create a bus with an explicit per-channel buffer size.
    pub fn with_buffer(buffer: usize) -> Self {
        let channels = Channel::ALL
            .into_iter()
            .map(|ch| (ch, broadcast::channel(buffer).0))
            .collect();
        Self {
            channels,
            firehose: broadcast::channel(buffer).0,
        }
    }

    /// Publish a message to its channel and the firehose.
    pub fn publish(&self, message: EventMessage) {
        let channel = message.payload.channel();
        if let Some(tx) = self.channels.get(&channel) {
            let _ = tx.send(message.clone());
        }
        let _ = self.firehose.send(message);
    }

    /// Subscribe to a single channel.
    pub fn subscribe(&self, channel: Channel) -> broadcast::Receiver<EventMessage> {
        self.channels
            .get(&channel)
            .expect("all channels exist from construction")
            .subscribe()
    }

    /// Subscribe to every channel in publish order.
    pub fn subscribe_all(&self) -> broadcast::Receiver<EventMessage> {
        self.firehose.subscribe()
    }

    /// Publish a progress event.
    pub fn publish_progress(&self, job_id: Uuid, payload: ProgressPayload) {
        self.publish(EventMessage::new(job_id, EventPayload::Progress(payload)));
    }

    /// Publish a state change event.
    pub fn publish_state_change(&self, job_id: Uuid, from: JobStatus, to: JobStatus) {
        self.publish(EventMessage::new(
            job_id,
            EventPayload::StateChange(StateChangePayload { from, to }),
        ));
    }

    /// Publish a log event.
    pub fn publish_log(&self, job_id: Uuid, level: LogLevel, message: impl Into<String>) {
        self.publish(EventMessage::new(
            job_id,
            EventPayload::Log(LogPayload {
                level,
                message: message.into(),
            }),
        ));
    }

    /// Publish an error event.
    pub fn publish_error(
        &self,
        job_id: Uuid,
        code: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
        stack: Option<String>,
    ) {
        self.publish(EventMessage::new(
            job_id,
            EventPayload::Error(ErrorPayload {
                code: code.into(),
                message: message.into(),
                retryable,
                stack,
            }),
        ));
    }

    /// Publish a metadata event.
    pub fn publish_metadata(&self, job_id: Uuid, patch: MediaPatch) {
        self.publish(EventMessage::new(job_id, EventPayload::Metadata(patch)));
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
