//! Bus message types.
//!
//! Worker payloads are a tagged sum dispatched at the aggregator's receive
//! boundary; every message carries the owning job id and a timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use redub_entity::job::status::JobStatus;
use redub_entity::media::MediaPatch;

/// The five bus channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Worker progress updates.
    Progress,
    /// Job state transitions.
    State,
    /// Worker log lines.
    Log,
    /// Worker errors.
    Error,
    /// Media metadata updates.
    Metadata,
}

impl Channel {
    /// All channels, for exhaustive subscription.
    pub const ALL: [Channel; 5] = [
        Channel::Progress,
        Channel::State,
        Channel::Log,
        Channel::Error,
        Channel::Metadata,
    ];

    /// Channel name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Progress => "progress",
            Self::State => "state",
            Self::Log => "log",
            Self::Error => "error",
            Self::Metadata => "metadata",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pipeline stage reported in progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Downloading,
    Extracting,
    Dubbing,
    Mixing,
    Muxing,
}

/// Worker log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Progress event payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPayload {
    /// Current stage.
    pub stage: Stage,
    /// Percent complete (0-100).
    pub percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloaded_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
    /// Bytes per second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Seconds remaining.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<u64>,
}

/// State change event payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StateChangePayload {
    /// State before the transition.
    pub from: JobStatus,
    /// State after the transition.
    pub to: JobStatus,
}

/// Log event payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogPayload {
    /// Severity.
    pub level: LogLevel,
    /// Message text.
    pub message: String,
}

/// Error event payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    /// Machine-readable error code (e.g. `DOWNLOAD_ERROR`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Whether the queue layer should retry the attempt.
    pub retryable: bool,
    /// Optional stack/backtrace text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Tagged payload sum over the five channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPayload {
    Progress(ProgressPayload),
    StateChange(StateChangePayload),
    Log(LogPayload),
    Error(ErrorPayload),
    Metadata(MediaPatch),
}

impl EventPayload {
    /// The channel this payload belongs to.
    pub fn channel(&self) -> Channel {
        match self {
            Self::Progress(_) => Channel::Progress,
            Self::StateChange(_) => Channel::State,
            Self::Log(_) => Channel::Log,
            Self::Error(_) => Channel::Error,
            Self::Metadata(_) => Channel::Metadata,
        }
    }

    /// Wire-level event type name (what subscribers see).
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Progress(_) => "progress",
            Self::StateChange(_) => "state_change",
            Self::Log(_) => "log",
            Self::Error(_) => "error",
            Self::Metadata(_) => "metadata",
        }
    }

    /// The payload body as a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Progress(p) => serde_json::to_value(p),
            Self::StateChange(p) => serde_json::to_value(p),
            Self::Log(p) => serde_json::to_value(p),
            Self::Error(p) => serde_json::to_value(p),
            Self::Metadata(p) => serde_json::to_value(p),
        }
        .unwrap_or(serde_json::Value::Null)
    }
}

/// A bus message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMessage {
    /// Owning job.
    pub job_id: Uuid,
    /// When the message was published.
    pub timestamp: DateTime<Utc>,
    /// Typed payload.
    pub payload: EventPayload,
}

impl EventMessage {
    /// Create a message stamped now.
    pub fn new(job_id: Uuid, payload: EventPayload) -> Self {
        Self {
            job_id,
            timestamp: Utc::now(),
            payload,
        }
    }
}
