//! redub server — video download pipeline with AI voice-over dubbing.
//!
//! Main entry point that wires all crates together and starts the server.

use tracing_subscriber::{EnvFilter, fmt};

use redub_api::StageCapabilities;
use redub_core::config::AppConfig;
use redub_core::error::AppError;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }
}

/// Load configuration from file and environment.
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("REDUB_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing.
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt().json().with_env_filter(filter).with_target(true).init();
        }
        _ => {
            fmt().pretty().with_env_filter(filter).with_target(true).init();
        }
    }
}

/// Connect the store, run migrations, and serve.
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Connecting to store...");
    let store = redub_database::Store::connect(&config.database).await?;
    redub_database::migration::run_migrations(&store).await?;

    redub_api::run_server(config, store, StageCapabilities::subprocess()).await
}
