//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate, with an environment overlay and `REDUB__`-prefixed
//! environment variables on top. Each sub-module represents a logical
//! configuration section.

pub mod auth;
pub mod database;
pub mod jobs;
pub mod logging;
pub mod media;
pub mod queue;
pub mod server;

use serde::{Deserialize, Serialize};

pub use self::auth::AuthConfig;
pub use self::database::DatabaseConfig;
pub use self::jobs::{DownloadConfig, JobDefaults, MuxConfig};
pub use self::logging::LoggingConfig;
pub use self::media::MediaConfig;
pub use self::queue::{QueueConfig, RecoverPolicy};
pub use self::server::ServerConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// Top-level deserialization target for the merged TOML configuration
/// files (default.toml + environment overlay).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Persistence store settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Media filesystem settings.
    #[serde(default)]
    pub media: MediaConfig,
    /// Authentication settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Queue coordinator settings.
    #[serde(default)]
    pub queue: QueueConfig,
    /// Job creation defaults.
    #[serde(default)]
    pub jobs: JobDefaults,
    /// Mux-stage audio mixing defaults.
    #[serde(default)]
    pub mux: MuxConfig,
    /// Download pass-through options.
    #[serde(default)]
    pub download: DownloadConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific
    /// overlay and environment variables prefixed with `REDUB__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("REDUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            media: MediaConfig::default(),
            auth: AuthConfig::default(),
            queue: QueueConfig::default(),
            jobs: JobDefaults::default(),
            mux: MuxConfig::default(),
            download: DownloadConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
