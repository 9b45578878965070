//! REST API endpoint handlers for the leaderboard server.
//!
//! Totals are read through the [`Aggregator`](house_cup_core::Aggregator)
//! on every request; control calls pass straight through to the
//! [`IngestionController`](house_cup_core::IngestionController).
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/leaderboard` | Per-house totals for one window |
//! | `POST` | `/api/start` | Start ingestion |
//! | `POST` | `/api/stop` | Stop ingestion |
//! | `GET` | `/api/status` | Whether ingestion is running |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse};
use house_cup_types::{ControlResponse, ControlStatus, House, IngestionStatus, Window, WindowTotals};

use crate::error::ObserverError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

/// Query parameters for the `GET /api/leaderboard` endpoint.
///
/// Built from the raw query pairs so that a repeated or unexpected
/// parameter never rejects the request. The first `window` wins.
#[derive(Debug, Default)]
pub struct LeaderboardQuery {
    /// Window name: `5min`, `1hour`, or `all`. Anything else means `all`.
    pub window: Option<String>,
}

impl LeaderboardQuery {
    /// Pick the first `window` value out of decoded query pairs.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let window = pairs
            .into_iter()
            .find_map(|(key, value)| (key == "window").then_some(value));
        Self { window }
    }

    /// The requested window, falling back to all-time.
    pub fn window(&self) -> Window {
        self.window
            .as_deref()
            .map_or(Window::AllTime, Window::parse_lenient)
    }
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page with all-time standings and API links.
pub async fn index(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ObserverError> {
    let totals = state.aggregator.totals(Window::AllTime).await?;
    let active = state.controller.status().active;
    let subscribers = state.hub.subscriber_count().await;

    let rows: String = House::ALL
        .iter()
        .map(|house| {
            format!(
                r#"<div class="metric"><div class="label">{house}</div><div class="value">{}</div></div>"#,
                totals.get(*house)
            )
        })
        .collect();
    let status = if active { "INGESTING" } else { "IDLE" };

    Ok(Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>House Cup</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
        .status {{ color: #3fb950; font-weight: bold; }}
    </style>
</head>
<body>
    <h1>House Cup</h1>
    <p class="subtitle">All-time house points</p>

    <p>Ingestion: <span class="status">{status}</span> &middot; live subscribers: {subscribers}</p>

    <div>{rows}</div>

    <h2>API</h2>
    <ul>
        <li>GET <a href="/api/leaderboard?window=5min">/api/leaderboard?window=5min</a></li>
        <li>GET <a href="/api/leaderboard?window=1hour">/api/leaderboard?window=1hour</a></li>
        <li>GET <a href="/api/leaderboard">/api/leaderboard</a></li>
        <li>GET <a href="/api/status">/api/status</a></li>
        <li>POST /api/start</li>
        <li>POST /api/stop</li>
        <li>WS /ws/leaderboard</li>
    </ul>
</body>
</html>"#
    )))
}

// ---------------------------------------------------------------------------
// GET /api/leaderboard
// ---------------------------------------------------------------------------

/// Per-house totals for the requested window.
pub async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<WindowTotals>, ObserverError> {
    let window = LeaderboardQuery::from_pairs(pairs).window();
    let totals = state.aggregator.totals(window).await?;
    Ok(Json(totals))
}

// ---------------------------------------------------------------------------
// Ingestion control
// ---------------------------------------------------------------------------

/// Start the ingestion worker. Idempotent.
pub async fn start_ingestion(State(state): State<Arc<AppState>>) -> Json<ControlResponse> {
    state.controller.start();
    Json(ControlResponse {
        status: ControlStatus::Started,
    })
}

/// Stop the ingestion worker. Idempotent.
pub async fn stop_ingestion(State(state): State<Arc<AppState>>) -> Json<ControlResponse> {
    state.controller.stop();
    Json(ControlResponse {
        status: ControlStatus::Stopped,
    })
}

/// Whether a worker is currently running.
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<IngestionStatus> {
    Json(state.controller.status())
}
