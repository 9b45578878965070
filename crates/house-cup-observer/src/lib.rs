//! HTTP and `WebSocket` API for the House Cup leaderboard.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **REST endpoints** for windowed per-house totals
//!   (`GET /api/leaderboard`)
//! - **Control endpoints** to start, stop, and inspect ingestion
//! - **`WebSocket` endpoint** (`/ws/leaderboard`) streaming a fresh
//!   snapshot of every window after each ingested event
//! - **Minimal HTML page** (`GET /`) with all-time standings
//!
//! # Architecture
//!
//! The handlers are thin. Totals come from the
//! [`Aggregator`](house_cup_core::Aggregator), control calls go to the
//! [`IngestionController`](house_cup_core::IngestionController), and each
//! socket is one subscriber on the
//! [`BroadcastHub`](house_cup_core::BroadcastHub).

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::ObserverError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use startup::{StartupError, spawn_observer};
pub use state::AppState;
