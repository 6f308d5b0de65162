//! Queue coordinator: per-queue dispatch loops with bounded concurrency,
//! timeout enforcement, retry scheduling, and retention reaping.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Semaphore, watch};
use tokio::time;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use redub_bus::EventBus;
use redub_core::config::QueueConfig;
use redub_core::result::AppResult;

use crate::entry::{QueueEntry, QueueName, QueueSpec, QueueStats};
use crate::store::QueueStore;
use crate::worker::{StageWorker, WorkerError};

/// Reap interval for terminal entry retention.
const REAP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Coordinates the three pipeline queues.
#[derive(Debug)]
pub struct QueueCoordinator {
    store: Arc<QueueStore>,
    bus: Arc<EventBus>,
    config: QueueConfig,
    specs: HashMap<QueueName, QueueSpec>,
    workers: HashMap<QueueName, Arc<dyn StageWorker>>,
}

impl QueueCoordinator {
    /// Create a coordinator with the fixed per-queue parameters.
    pub fn new(store: Arc<QueueStore>, bus: Arc<EventBus>, config: QueueConfig) -> Self {
        let specs = QueueName::ALL
            .into_iter()
            .map(|name| (name, QueueSpec::for_queue(name, &config)))
            .collect();
        Self {
            store,
            bus,
            config,
            specs,
            workers: HashMap::new(),
        }
    }

    /// Register the worker for a queue.
    pub fn register_worker(&mut self, worker: Arc<dyn StageWorker>) {
        let queue = worker.queue();
        info!(queue = %queue, "Registered stage worker");
        self.workers.insert(queue, worker);
    }

    /// Dispatch parameters for a queue.
    pub fn spec(&self, queue: QueueName) -> &QueueSpec {
        self.specs.get(&queue).expect("all queues have specs")
    }

    /// Idempotent enqueue with the queue's retry parameters.
    pub async fn enqueue(
        &self,
        queue: QueueName,
        job_id: Uuid,
        payload: serde_json::Value,
        priority: i64,
    ) -> AppResult<()> {
        self.store
            .enqueue(self.spec(queue), job_id, payload, priority)
            .await
    }

    /// Reshuffle live entries after a job priority change.
    pub async fn update_priority(&self, job_id: Uuid, priority: i64) -> AppResult<()> {
        self.store.update_priority(job_id, priority).await
    }

    /// Best-effort removal from one queue.
    pub async fn remove(&self, queue: QueueName, job_id: Uuid) -> AppResult<()> {
        self.store.remove(queue, job_id).await
    }

    /// Best-effort removal from every queue (cancel/delete path).
    pub async fn remove_everywhere(&self, job_id: Uuid) -> AppResult<()> {
        for queue in QueueName::ALL {
            self.store.remove(queue, job_id).await?;
        }
        Ok(())
    }

    /// Entry counts per state for one queue.
    pub async fn stats(&self, queue: QueueName) -> AppResult<QueueStats> {
        self.store.stats(queue).await
    }

    /// Recover orphaned entries, then spawn one dispatcher per registered
    /// worker plus the retention reaper. Tasks run until `cancel` flips.
    pub async fn start(self: Arc<Self>, cancel: watch::Receiver<bool>) -> AppResult<()> {
        self.store.recover_orphans(self.config.recover_active).await?;

        for (queue, worker) in &self.workers {
            let spec = *self.spec(*queue);
            let coordinator = Arc::clone(&self);
            let worker = Arc::clone(worker);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                coordinator.run_dispatcher(spec, worker, cancel).await;
            });
        }

        let coordinator = Arc::clone(&self);
        tokio::spawn(async move {
            coordinator.run_reaper(cancel).await;
        });

        Ok(())
    }

    /// Poll-and-dispatch loop for one queue.
    async fn run_dispatcher(
        self: Arc<Self>,
        spec: QueueSpec,
        worker: Arc<dyn StageWorker>,
        mut cancel: watch::Receiver<bool>,
    ) {
        info!(
            queue = %spec.name,
            concurrency = spec.concurrency,
            "Queue dispatcher started"
        );

        let semaphore = Arc::new(Semaphore::new(spec.concurrency));
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms.max(10));

        loop {
            tokio::select! {
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        break;
                    }
                }
                _ = time::sleep(poll_interval) => {
                    Self::drain_queue(&self, &spec, &worker, &semaphore).await;
                }
            }
        }

        // Wait for in-flight entries before reporting shutdown.
        let _ = time::timeout(
            Duration::from_secs(30),
            semaphore.acquire_many(spec.concurrency as u32),
        )
        .await;
        info!(queue = %spec.name, "Queue dispatcher stopped");
    }

    /// Claim entries while worker slots are free.
    async fn drain_queue(
        this: &Arc<Self>,
        spec: &QueueSpec,
        worker: &Arc<dyn StageWorker>,
        semaphore: &Arc<Semaphore>,
    ) {
        loop {
            let permit = match Arc::clone(semaphore).try_acquire_owned() {
                Ok(p) => p,
                Err(_) => return,
            };

            match this.store.claim_next(spec.name).await {
                Ok(Some(entry)) => {
                    debug!(
                        queue = %spec.name,
                        job_id = %entry.job_id,
                        attempt = entry.attempts,
                        max = entry.max_attempts,
                        "Dispatching entry"
                    );
                    let coordinator = Arc::clone(this);
                    let worker = Arc::clone(worker);
                    let spec = *spec;
                    tokio::spawn(async move {
                        let _permit = permit;
                        coordinator.run_entry(&spec, worker.as_ref(), entry).await;
                    });
                }
                Ok(None) => return,
                Err(e) => {
                    error!(queue = %spec.name, error = %e, "Failed to claim entry");
                    return;
                }
            }
        }
    }

    /// Execute one claimed entry and settle its outcome.
    async fn run_entry(&self, spec: &QueueSpec, worker: &dyn StageWorker, entry: QueueEntry) {
        let outcome = match time::timeout(spec.timeout, worker.execute(&entry)).await {
            Ok(result) => result,
            Err(_) => {
                // The worker cannot publish its own error event after a
                // timeout, so the coordinator does.
                let err = WorkerError::transient(
                    "TIMEOUT",
                    format!("stage timed out after {}s", spec.timeout.as_secs()),
                );
                self.bus.publish_error(
                    entry.job_id,
                    err.code.clone(),
                    err.message.clone(),
                    true,
                    None,
                );
                Err(err)
            }
        };

        match outcome {
            Ok(()) => {
                if let Err(e) = self.store.mark_completed(entry.id).await {
                    error!(entry = entry.id, error = %e, "Failed to mark entry completed");
                }
            }
            Err(err) if err.retryable && entry.attempts < entry.max_attempts => {
                let delay = entry.backoff_delay();
                let run_at = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
                warn!(
                    queue = %spec.name,
                    job_id = %entry.job_id,
                    attempt = entry.attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient failure, scheduling re-dispatch"
                );
                if let Err(e) = self.store.mark_delayed(entry.id, run_at, &err.message).await {
                    error!(entry = entry.id, error = %e, "Failed to delay entry");
                }
            }
            Err(err) => {
                if err.retryable {
                    // Attempts exhausted on a transient error: surface a
                    // non-retryable error event so the job fails.
                    self.bus.publish_error(
                        entry.job_id,
                        err.code.clone(),
                        format!("{} (attempts exhausted)", err.message),
                        false,
                        None,
                    );
                }
                error!(
                    queue = %spec.name,
                    job_id = %entry.job_id,
                    attempt = entry.attempts,
                    error = %err,
                    "Entry failed"
                );
                if let Err(e) = self.store.mark_failed(entry.id, &err.message).await {
                    error!(entry = entry.id, error = %e, "Failed to mark entry failed");
                }
            }
        }
    }

    /// Periodic retention reaper: completed after 24 h, failed after 7 d.
    async fn run_reaper(self: Arc<Self>, mut cancel: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        return;
                    }
                }
                _ = time::sleep(REAP_INTERVAL) => {
                    match self
                        .store
                        .reap(
                            self.config.completed_retention_hours,
                            self.config.failed_retention_days,
                        )
                        .await
                    {
                        Ok(0) => {}
                        Ok(reaped) => debug!(reaped, "Reaped terminal queue entries"),
                        Err(e) => error!(error = %e, "Queue reaper failed"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use redub_core::config::DatabaseConfig;
    use redub_database::{Store, migration};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct SlowWorker {
        in_flight: Arc<AtomicUsize>,
        max_seen: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl StageWorker for SlowWorker {
        fn queue(&self) -> QueueName {
            QueueName::Download
        }

        async fn execute(&self, _entry: &QueueEntry) -> Result<(), WorkerError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(now, Ordering::SeqCst);
            time::sleep(Duration::from_millis(50)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn build() -> (tempfile::TempDir, Arc<QueueStore>, Arc<EventBus>) {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            path: dir.path().join("q.db").to_string_lossy().into_owned(),
            ..Default::default()
        };
        let store = Store::connect(&config).await.unwrap();
        migration::run_migrations(&store).await.unwrap();
        (dir, Arc::new(QueueStore::new(store)), Arc::new(EventBus::new()))
    }

    #[tokio::test]
    async fn in_flight_never_exceeds_concurrency() {
        let (_dir, store, bus) = build().await;
        let config = QueueConfig {
            poll_interval_ms: 10,
            ..Default::default()
        };

        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let mut coordinator = QueueCoordinator::new(Arc::clone(&store), bus, config);
        coordinator.register_worker(Arc::new(SlowWorker {
            in_flight: Arc::clone(&in_flight),
            max_seen: Arc::clone(&max_seen),
        }));
        let coordinator = Arc::new(coordinator);

        for _ in 0..4 {
            coordinator
                .enqueue(QueueName::Download, Uuid::now_v7(), serde_json::json!({}), 0)
                .await
                .unwrap();
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        Arc::clone(&coordinator).start(cancel_rx).await.unwrap();

        // Wait until all four entries complete.
        for _ in 0..100 {
            let stats = coordinator.stats(QueueName::Download).await.unwrap();
            if stats.completed == 4 {
                break;
            }
            time::sleep(Duration::from_millis(20)).await;
        }
        let _ = cancel_tx.send(true);

        let stats = coordinator.stats(QueueName::Download).await.unwrap();
        assert_eq!(stats.completed, 4);
        assert_eq!(max_seen.load(Ordering::SeqCst), 1, "download queue is strict FIFO");
    }

    #[derive(Debug)]
    struct FlakyWorker {
        failures: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl StageWorker for FlakyWorker {
        fn queue(&self) -> QueueName {
            QueueName::Download
        }

        async fn execute(&self, _entry: &QueueEntry) -> Result<(), WorkerError> {
            if self.failures.fetch_sub(1, Ordering::SeqCst) > 1 {
                Err(WorkerError::transient("NETWORK", "connection reset"))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn exhausted_transient_error_publishes_non_retryable_event() {
        let (_dir, store, bus) = build().await;
        let mut rx = bus.subscribe_all();

        let coordinator = QueueCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&bus),
            QueueConfig::default(),
        );
        let spec = *coordinator.spec(QueueName::Download);
        let job_id = Uuid::now_v7();
        store
            .enqueue(&spec, job_id, serde_json::json!({}), 0)
            .await
            .unwrap();

        // Drive the entry through its three attempts directly.
        let worker = FlakyWorker {
            failures: Arc::new(AtomicUsize::new(100)),
        };
        for attempt in 0..3 {
            if attempt > 0 {
                // Bring the backoff target into the past for the re-claim.
                store
                    .mark_delayed(1, Utc::now() - chrono::Duration::seconds(1), "transient")
                    .await
                    .unwrap();
            }
            let entry = store.claim_next(QueueName::Download).await.unwrap().unwrap();
            coordinator.run_entry(&spec, &worker, entry).await;
        }

        let msg = rx.recv().await.unwrap();
        match msg.payload {
            redub_bus::EventPayload::Error(err) => {
                assert!(!err.retryable);
                assert!(err.message.contains("attempts exhausted"));
            }
            other => panic!("unexpected payload: {other:?}"),
        }

        let stats = store.stats(QueueName::Download).await.unwrap();
        assert_eq!(stats.failed, 1);
    }
}
