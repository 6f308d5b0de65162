//! Application wiring: construct every long-lived component, spawn the
//! background tasks, and serve the API.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tracing::info;

use redub_auth::{JwtDecoder, JwtEncoder, PasswordHasher, SessionManager, bootstrap};
use redub_bus::EventBus;
use redub_core::config::AppConfig;
use redub_core::error::AppError;
use redub_database::Store;
use redub_database::repositories::event::EventRepository;
use redub_database::repositories::job::JobRepository;
use redub_database::repositories::media::MediaRepository;
use redub_database::repositories::session::SessionRepository;
use redub_database::repositories::user::UserRepository;
use redub_queue::{QueueCoordinator, QueueStore};
use redub_realtime::SubscriptionGateway;
use redub_service::{EventAggregator, JobService};
use redub_worker::{
    DownloadWorker, DubWorker, MuxWorker, TrackMuxer, VideoFetcher, VoiceDubber, WorkerContext,
    shell,
};

use crate::router::build_router;
use crate::state::AppState;

/// The three external capabilities the stage workers drive.
#[derive(Debug, Clone)]
pub struct StageCapabilities {
    /// Video download capability.
    pub fetcher: Arc<dyn VideoFetcher>,
    /// Voice-over translation capability.
    pub dubber: Arc<dyn VoiceDubber>,
    /// Mixing/muxing capability.
    pub muxer: Arc<dyn TrackMuxer>,
}

impl StageCapabilities {
    /// Production capabilities: yt-dlp, vot-cli and ffmpeg subprocesses.
    pub fn subprocess() -> Self {
        Self {
            fetcher: Arc::new(shell::YtDlpFetcher),
            dubber: Arc::new(shell::VotCliDubber),
            muxer: Arc::new(shell::FfmpegMuxer),
        }
    }
}

/// Construct all components, start the background tasks, and return the
/// shared state plus the shutdown signal sender.
pub async fn build_state(
    config: AppConfig,
    store: Store,
    capabilities: StageCapabilities,
) -> Result<(AppState, watch::Sender<bool>), AppError> {
    let config = Arc::new(config);

    // Repositories.
    let job_repo = Arc::new(JobRepository::new(store.clone()));
    let media_repo = Arc::new(MediaRepository::new(store.clone()));
    let event_repo = Arc::new(EventRepository::new(store.clone()));
    let user_repo = Arc::new(UserRepository::new(store.clone()));
    let session_repo = Arc::new(SessionRepository::new(store.clone()));

    // Auth.
    let password_hasher = Arc::new(PasswordHasher::new());
    let jwt_encoder = Arc::new(JwtEncoder::new(&config.auth));
    let jwt_decoder = Arc::new(JwtDecoder::new(&config.auth));
    let session_manager = Arc::new(SessionManager::new(
        jwt_encoder,
        jwt_decoder,
        Arc::clone(&user_repo),
        session_repo,
        Arc::clone(&password_hasher),
    ));
    bootstrap::ensure_admin(&user_repo, &password_hasher, &config.auth).await?;

    // Media directories.
    tokio::fs::create_dir_all(std::path::Path::new(&config.media.root).join("incomplete")).await?;
    tokio::fs::create_dir_all(config.media.complete_dir()).await?;

    // Bus, queue and workers.
    let bus = Arc::new(EventBus::new());
    let queue_store = Arc::new(QueueStore::new(store.clone()));
    let worker_ctx = Arc::new(WorkerContext::new(
        Arc::clone(&bus),
        Arc::clone(&job_repo),
        Arc::clone(&media_repo),
        Arc::clone(&queue_store),
        config.media.clone(),
        config.mux.clone(),
        config.queue.clone(),
    ));

    let mut coordinator = QueueCoordinator::new(
        Arc::clone(&queue_store),
        Arc::clone(&bus),
        config.queue.clone(),
    );
    coordinator.register_worker(Arc::new(DownloadWorker::new(
        Arc::clone(&worker_ctx),
        capabilities.fetcher,
    )));
    coordinator.register_worker(Arc::new(DubWorker::new(
        Arc::clone(&worker_ctx),
        capabilities.dubber,
    )));
    coordinator.register_worker(Arc::new(MuxWorker::new(
        Arc::clone(&worker_ctx),
        capabilities.muxer,
    )));
    let coordinator = Arc::new(coordinator);

    // Realtime gateway and the aggregator.
    let gateway = Arc::new(SubscriptionGateway::new());
    let aggregator = EventAggregator::new(
        Arc::clone(&job_repo),
        Arc::clone(&media_repo),
        Arc::clone(&event_repo),
        Arc::clone(&gateway),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let firehose = bus.subscribe_all();
    let aggregator_cancel = shutdown_rx.clone();
    tokio::spawn(async move {
        aggregator.run(firehose, aggregator_cancel).await;
    });

    Arc::clone(&coordinator).start(shutdown_rx).await?;

    let job_service = Arc::new(JobService::new(
        job_repo,
        media_repo,
        event_repo,
        Arc::clone(&coordinator),
        Arc::clone(&gateway),
        config.media.clone(),
        config.jobs.clone(),
        config.download.clone(),
        config.mux.clone(),
    ));

    let state = AppState {
        config,
        store,
        session_manager,
        job_service,
        coordinator,
        gateway,
        started_at: Instant::now(),
    };
    Ok((state, shutdown_tx))
}

/// Build the app and serve until SIGINT.
pub async fn run_server(
    config: AppConfig,
    store: Store,
    capabilities: StageCapabilities,
) -> Result<(), AppError> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let (state, shutdown_tx) = build_state(config, store, capabilities).await?;
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;
    info!(addr = %addr, "Control API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

    Ok(())
}
