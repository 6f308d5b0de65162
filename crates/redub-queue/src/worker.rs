//! Stage worker trait and the worker error value.

use async_trait::async_trait;
use thiserror::Error;

use crate::entry::{QueueEntry, QueueName};

/// A worker error. The retry decision is data on the value, not a
/// separate error class: the coordinator re-dispatches retryable errors
/// with backoff and dead-letters the rest.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct WorkerError {
    /// Machine-readable code (e.g. `DOWNLOAD_ERROR`, `MUX_ERROR`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Whether the queue layer should retry the attempt.
    pub retryable: bool,
}

impl WorkerError {
    /// A transient failure the queue should retry with backoff.
    pub fn transient(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            retryable: true,
        }
    }

    /// A permanent failure that dead-letters the entry.
    pub fn permanent(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            retryable: false,
        }
    }
}

impl From<serde_json::Error> for WorkerError {
    fn from(err: serde_json::Error) -> Self {
        Self::permanent("SERIALIZATION", err.to_string())
    }
}

impl From<redub_core::error::AppError> for WorkerError {
    /// Store/bus plumbing failures inside a worker are retried like any
    /// other transient fault.
    fn from(err: redub_core::error::AppError) -> Self {
        Self::transient("INTERNAL", err.to_string())
    }
}

/// A stage worker bound to one queue.
///
/// Contract: the worker publishes its own bus events (state changes,
/// progress, logs, metadata, and the error event for any failure it
/// returns). The coordinator publishes error events only for timeouts and
/// retry exhaustion, where the worker cannot.
#[async_trait]
pub trait StageWorker: Send + Sync + std::fmt::Debug {
    /// The queue this worker consumes.
    fn queue(&self) -> QueueName;

    /// Process one claimed entry.
    async fn execute(&self, entry: &QueueEntry) -> Result<(), WorkerError>;
}
