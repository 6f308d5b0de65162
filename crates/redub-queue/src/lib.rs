//! Queue coordinator: three durable priority queues with bounded
//! concurrency, retry with exponential backoff, idempotent enqueue,
//! dead-letter retention, and restart recovery.

pub mod coordinator;
pub mod entry;
pub mod store;
pub mod worker;

pub use coordinator::QueueCoordinator;
pub use entry::{EntryState, QueueEntry, QueueName, QueueSpec, QueueStats};
pub use store::QueueStore;
pub use worker::{StageWorker, WorkerError};
