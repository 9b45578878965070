//! House Cup leaderboard server.
//!
//! This is the main entry point that wires together the event store,
//! aggregator, broadcast hub, ingestion controller, and HTTP API. It
//! loads configuration, initializes all subsystems, and serves until
//! `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `house-cup-config.yaml` (or `HOUSE_CUP_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Open the event store and run migrations
//! 4. Build the hub, producer, and ingestion controller
//! 5. Start the HTTP + `WebSocket` server
//! 6. Optionally start ingestion
//! 7. On `Ctrl-C`: stop ingestion, wait for the worker, stop the server

mod bootstrap;
mod error;

use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use house_cup_core::config::{LogFormat, LoggingConfig};
use house_cup_observer::ServerConfig;

use crate::error::AppError;

/// Application entry point for the leaderboard server.
///
/// # Errors
///
/// Returns an error if any initialization step fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging is not up yet, so a missing file is
    //    reported once the subscriber is installed.
    let config_path = bootstrap::config_path();
    let config_found = config_path.exists();
    let config = bootstrap::load_config(&config_path)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging)?;

    info!(
        config = %config_path.display(),
        config_found,
        host = %config.server.host,
        port = config.server.port,
        backend = ?config.database.backend,
        "house-cup-server starting"
    );

    // 3. Open the event store.
    let store = bootstrap::open_store(&config).await?;

    // 4. Wire up services.
    let producer = bootstrap::default_producer(&config);
    let state = bootstrap::build_state(&config, store, producer);
    info!(
        interval_ms = config.ingestion.interval_ms,
        max_events = config.ingestion.max_events,
        subscriber_buffer = state.subscriber_buffer,
        "Services assembled"
    );

    // 5. Start the HTTP server.
    let shutdown = CancellationToken::new();
    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };
    let server = house_cup_observer::spawn_observer(
        server_config,
        std::sync::Arc::clone(&state),
        shutdown.clone(),
    )
    .map_err(AppError::from)?;

    // 6. Optionally start ingestion.
    if config.ingestion.autostart {
        state.controller.start();
    }

    // 7. Wait for Ctrl-C, then shut down in order.
    tokio::signal::ctrl_c().await.map_err(AppError::from)?;
    info!("Shutdown signal received");

    let reports = state.controller.shutdown().await;
    info!(workers = reports.len(), "Ingestion stopped");

    shutdown.cancel();
    if let Err(e) = server.await {
        tracing::error!(error = %e, "Server task failed");
    }

    info!("house-cup-server shutdown complete");
    Ok(())
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(logging: &LoggingConfig) -> Result<(), AppError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = match logging.format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    result.map_err(|e| AppError::Logging {
        message: e.to_string(),
    })
}
