//! Shared test harness and fake stage capabilities.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use redub_api::{AppState, StageCapabilities, build_state};
use redub_bus::{EventBus, LogLevel, ProgressPayload, Stage};
use redub_core::config::AppConfig;
use redub_database::{Store, migration};
use redub_entity::job::payload::{DownloadParams, DubParams, MuxParams};
use redub_queue::WorkerError;
use redub_worker::{FetchedMedia, SourceMetadata, TrackMuxer, VideoFetcher, VoiceDubber};

/// Test application context.
pub struct TestApp {
    /// The router for making test requests.
    pub router: Router,
    /// Shared application state.
    pub state: AppState,
    _media_dir: tempfile::TempDir,
    _db_dir: tempfile::TempDir,
    _shutdown: tokio::sync::watch::Sender<bool>,
}

impl TestApp {
    /// Build a test app with the given capabilities.
    pub async fn new(capabilities: StageCapabilities) -> Self {
        Self::with_config(capabilities, |_| {}).await
    }

    /// Build a test app, letting the caller tweak the config first.
    pub async fn with_config(
        capabilities: StageCapabilities,
        tweak: impl FnOnce(&mut AppConfig),
    ) -> Self {
        let media_dir = tempfile::tempdir().expect("media tempdir");
        let db_dir = tempfile::tempdir().expect("db tempdir");

        let mut config = AppConfig::default();
        config.database.path = db_dir
            .path()
            .join("redub.db")
            .to_string_lossy()
            .into_owned();
        config.media.root = media_dir.path().to_string_lossy().into_owned();
        config.media.min_free_space_gb = 0;
        config.auth.admin_username = Some("admin".into());
        config.auth.admin_password = Some("admin".into());
        config.queue.poll_interval_ms = 20;
        tweak(&mut config);

        let store = Store::connect(&config.database).await.expect("store");
        migration::run_migrations(&store).await.expect("migrations");

        let (state, shutdown) = build_state(config, store, capabilities)
            .await
            .expect("build state");
        let router = redub_api::router::build_router(state.clone());

        Self {
            router,
            state,
            _media_dir: media_dir,
            _db_dir: db_dir,
            _shutdown: shutdown,
        }
    }

    /// Make a request against the router.
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", "application/json");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }

        let body_str = body
            .map(|b| serde_json::to_string(&b).expect("serialize body"))
            .unwrap_or_default();
        let request = builder.body(Body::from(body_str)).expect("build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("send request");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("read body");
        let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse { status, body }
    }

    /// Login as the bootstrapped admin and return the token.
    pub async fn login(&self) -> String {
        let response = self
            .request(
                "POST",
                "/auth/login",
                Some(serde_json::json!({"username": "admin", "password": "admin"})),
                None,
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "login: {:?}", response.body);
        response.body["token"].as_str().expect("token").to_string()
    }

    /// Create a job and return its id.
    pub async fn create_job(&self, token: &str, body: Value) -> String {
        let response = self.request("POST", "/jobs", Some(body), Some(token)).await;
        assert_eq!(
            response.status,
            StatusCode::CREATED,
            "create job: {:?}",
            response.body
        );
        response.body["id"].as_str().expect("job id").to_string()
    }

    /// Fetch a job's detail document.
    pub async fn get_job(&self, token: &str, id: &str) -> Value {
        let response = self
            .request("GET", &format!("/jobs/{id}"), None, Some(token))
            .await;
        assert_eq!(response.status, StatusCode::OK, "get job: {:?}", response.body);
        response.body
    }

    /// Poll until the job reaches `status` or the deadline passes.
    pub async fn wait_for_status(&self, token: &str, id: &str, status: &str) -> Value {
        for _ in 0..600 {
            let job = self.get_job(token, id).await;
            if job["status"] == status {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("job {id} never reached status {status}");
    }

    /// Poll until `path` exists on disk or the deadline passes.
    pub async fn wait_for_path(&self, path: &std::path::Path) {
        for _ in 0..600 {
            if path.exists() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("timed out waiting for {}", path.display());
    }

    /// The job's work-in-progress directory.
    pub fn incomplete_dir(&self, id: &str) -> PathBuf {
        self.state.config.media.incomplete_dir(id)
    }
}

/// Response from a test request.
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Parsed JSON body.
    pub body: Value,
}

/// Fake fetcher: writes a small video file into the temp dir and emits
/// progress. Fails transiently `transient_failures` times first; fails
/// permanently forever when `permanent` is set.
#[derive(Debug)]
pub struct FakeFetcher {
    transient_failures: AtomicUsize,
    permanent: bool,
    delay: Duration,
}

impl FakeFetcher {
    pub fn ok() -> Self {
        Self {
            transient_failures: AtomicUsize::new(0),
            permanent: false,
            delay: Duration::ZERO,
        }
    }

    pub fn flaky(failures: usize) -> Self {
        Self {
            transient_failures: AtomicUsize::new(failures),
            ..Self::ok()
        }
    }

    pub fn broken() -> Self {
        Self {
            permanent: true,
            ..Self::ok()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::ok()
        }
    }
}

#[async_trait]
impl VideoFetcher for FakeFetcher {
    async fn fetch(
        &self,
        params: &DownloadParams,
        events: &EventBus,
    ) -> Result<FetchedMedia, WorkerError> {
        tokio::fs::create_dir_all(&params.temp_dir).await.unwrap();

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.permanent {
            return Err(WorkerError::permanent("DOWNLOAD_ERROR", "Unsupported URL"));
        }
        if self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(WorkerError::transient("NETWORK", "connection reset by peer"));
        }

        events.publish_progress(
            params.job_id,
            ProgressPayload {
                stage: Stage::Downloading,
                percent: 0.0,
                downloaded_bytes: Some(0),
                total_bytes: Some(4),
                speed: None,
                eta: None,
            },
        );

        let video_path = params
            .temp_dir
            .join(format!("src123.{}", params.output_container.as_str()));
        tokio::fs::write(&video_path, b"vid!").await.unwrap();

        events.publish_progress(
            params.job_id,
            ProgressPayload {
                stage: Stage::Downloading,
                percent: 100.0,
                downloaded_bytes: Some(4),
                total_bytes: Some(4),
                speed: None,
                eta: None,
            },
        );
        events.publish_log(params.job_id, LogLevel::Info, "fake download finished");

        Ok(FetchedMedia {
            video_path,
            metadata: SourceMetadata {
                source_id: Some("src123".into()),
                source_title: Some("Test Video".into()),
                source_uploader: Some("Uploader".into()),
                duration_sec: Some(12.0),
                width: Some(1920),
                height: Some(1080),
                fps: Some(25.0),
                video_codec: Some("h264".into()),
                audio_codec: Some("aac".into()),
                ..Default::default()
            },
        })
    }
}

/// Fake dubber: writes the dubbed track, or fails permanently
/// `failures` times first.
#[derive(Debug)]
pub struct FakeDubber {
    permanent_failures: AtomicUsize,
}

impl FakeDubber {
    pub fn ok() -> Self {
        Self {
            permanent_failures: AtomicUsize::new(0),
        }
    }

    pub fn broken_times(failures: usize) -> Self {
        Self {
            permanent_failures: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl VoiceDubber for FakeDubber {
    async fn dub(&self, params: &DubParams, _events: &EventBus) -> Result<PathBuf, WorkerError> {
        if self
            .permanent_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(WorkerError::permanent(
                "DUB_ERROR",
                "unsupported language pair",
            ));
        }
        tokio::fs::create_dir_all(&params.temp_dir).await.unwrap();
        tokio::fs::write(&params.output_path, b"dub!").await.unwrap();
        Ok(params.output_path.clone())
    }
}

/// Fake muxer: writes the container output into the temp dir.
#[derive(Debug)]
pub struct FakeMuxer;

#[async_trait]
impl TrackMuxer for FakeMuxer {
    async fn mux(&self, params: &MuxParams, _events: &EventBus) -> Result<PathBuf, WorkerError> {
        tokio::fs::create_dir_all(&params.temp_dir).await.unwrap();
        let out = params
            .temp_dir
            .join(format!("output.{}", params.output_container.as_str()));
        tokio::fs::write(&out, b"mux!").await.unwrap();
        Ok(out)
    }
}

/// Capabilities where every stage succeeds.
pub fn happy_capabilities() -> StageCapabilities {
    StageCapabilities {
        fetcher: Arc::new(FakeFetcher::ok()),
        dubber: Arc::new(FakeDubber::ok()),
        muxer: Arc::new(FakeMuxer),
    }
}

/// Capabilities with a custom fetcher.
pub fn capabilities_with_fetcher(fetcher: FakeFetcher) -> StageCapabilities {
    StageCapabilities {
        fetcher: Arc::new(fetcher),
        dubber: Arc::new(FakeDubber::ok()),
        muxer: Arc::new(FakeMuxer),
    }
}

/// Capabilities with a custom dubber.
pub fn capabilities_with_dubber(dubber: FakeDubber) -> StageCapabilities {
    StageCapabilities {
        fetcher: Arc::new(FakeFetcher::ok()),
        dubber: Arc::new(dubber),
        muxer: Arc::new(FakeMuxer),
    }
}
