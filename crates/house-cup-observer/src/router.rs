//! Axum router construction for the leaderboard API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the leaderboard server.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /ws/leaderboard` -- `WebSocket` live feed
/// - `GET /api/leaderboard` -- totals for one window
/// - `POST /api/start` -- start ingestion
/// - `POST /api/stop` -- stop ingestion
/// - `GET /api/status` -- ingestion status
///
/// CORS allows any origin so a browser dashboard served elsewhere can
/// call the API.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status page
        .route("/", get(handlers::index))
        // WebSocket
        .route("/ws/leaderboard", get(ws::ws_leaderboard))
        // REST API
        .route("/api/leaderboard", get(handlers::get_leaderboard))
        .route("/api/start", post(handlers::start_ingestion))
        .route("/api/stop", post(handlers::stop_ingestion))
        .route("/api/status", get(handlers::get_status))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
