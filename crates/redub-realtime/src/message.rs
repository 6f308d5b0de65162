//! WebSocket message types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use redub_bus::EventMessage;

/// Messages sent by the client to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Subscribe to a set of jobs.
    Subscribe {
        /// Job ids to follow.
        #[serde(rename = "jobIds")]
        job_ids: Vec<Uuid>,
    },
    /// Unsubscribe from a set of jobs.
    Unsubscribe {
        /// Job ids to stop following.
        #[serde(rename = "jobIds")]
        job_ids: Vec<Uuid>,
    },
}

/// A server-to-client push message: `{jobId?, type, timestamp, payload}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    /// Owning job, absent on global broadcasts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    /// Message type: `progress`, `state_change`, `log`, `error`,
    /// `notification`, `job_added`, `job_removed`.
    #[serde(rename = "type")]
    pub message_type: String,
    /// When the message was produced.
    pub timestamp: DateTime<Utc>,
    /// Type-specific payload.
    pub payload: serde_json::Value,
}

impl ServerMessage {
    /// Wrap a bus event for fan-out to the job's room.
    pub fn from_event(event: &EventMessage) -> Self {
        Self {
            job_id: Some(event.job_id),
            message_type: event.payload.type_name().to_string(),
            timestamp: event.timestamp,
            payload: event.payload.to_json(),
        }
    }

    /// Global notification broadcast.
    pub fn notification(payload: serde_json::Value) -> Self {
        Self {
            job_id: None,
            message_type: "notification".to_string(),
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Broadcast announcing a new job.
    pub fn job_added(job: serde_json::Value) -> Self {
        Self {
            job_id: None,
            message_type: "job_added".to_string(),
            timestamp: Utc::now(),
            payload: job,
        }
    }

    /// Broadcast announcing a deleted job.
    pub fn job_removed(job_id: Uuid) -> Self {
        Self {
            job_id: None,
            message_type: "job_removed".to_string(),
            timestamp: Utc::now(),
            payload: serde_json::json!({ "jobId": job_id }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_subscribe_parses_job_ids() {
        let id = Uuid::now_v7();
        let raw = format!(r#"{{"type":"subscribe","jobIds":["{id}"]}}"#);
        let msg: InboundMessage = serde_json::from_str(&raw).unwrap();
        match msg {
            InboundMessage::Subscribe { job_ids } => assert_eq!(job_ids, vec![id]),
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
