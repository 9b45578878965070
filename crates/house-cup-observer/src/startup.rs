//! Server startup helper for the binary.
//!
//! Provides [`spawn_observer`] which launches the HTTP + `WebSocket`
//! server on a background Tokio task, so the binary can wait for a
//! shutdown signal alongside it.
//!
//! # Usage
//!
//! ```rust,ignore
//! use house_cup_observer::startup::spawn_observer;
//! use house_cup_observer::ServerConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! let shutdown = CancellationToken::new();
//! let handle = spawn_observer(ServerConfig::default(), state, shutdown.clone())?;
//! // ... later
//! shutdown.cancel();
//! handle.await?;
//! ```

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::server::{ServerConfig, ServerError};
use crate::state::AppState;

/// Errors that can occur when spawning the server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// Spawn the HTTP server on a background Tokio task.
///
/// The server runs until `shutdown` is cancelled. Bind failures inside
/// the task are logged; the caller should await the returned handle
/// during shutdown.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the configured address does not
/// parse. This is checked before the background task is spawned.
pub fn spawn_observer(
    config: ServerConfig,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> Result<JoinHandle<()>, StartupError> {
    let addr = config.socket_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = crate::server::start_server(&config, state, shutdown).await {
            tracing::error!(error = %e, "Leaderboard server exited with error");
        }
    });

    tracing::info!(%addr, "Leaderboard server spawned on background task");

    Ok(handle)
}
