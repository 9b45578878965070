//! Shared application state for the leaderboard API server.
//!
//! [`AppState`] bundles the three services the handlers talk to: the
//! [`Aggregator`] for totals queries, the [`BroadcastHub`] that live-feed
//! sockets register with, and the [`IngestionController`] behind the
//! start/stop endpoints. Handlers never touch the store directly.

use std::sync::Arc;

use house_cup_core::{Aggregator, BroadcastHub, IngestionController};

/// Default per-socket buffer for live-feed messages.
///
/// A socket that falls further behind than this misses intermediate
/// updates and resumes with the next one.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Computes windowed totals for `GET /api/leaderboard`.
    pub aggregator: Aggregator,
    /// Live-feed subscriber registry.
    pub hub: Arc<BroadcastHub>,
    /// Owner of the ingestion worker slot.
    pub controller: IngestionController,
    /// Per-socket buffer passed to each new live-feed subscriber.
    pub subscriber_buffer: usize,
}

impl AppState {
    /// Create application state around existing services.
    pub fn new(hub: Arc<BroadcastHub>, controller: IngestionController) -> Self {
        Self {
            aggregator: hub.aggregator().clone(),
            hub,
            controller,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
        }
    }

    /// Override the per-socket buffer. Clamped to at least one message.
    #[must_use]
    pub fn with_subscriber_buffer(mut self, buffer: usize) -> Self {
        self.subscriber_buffer = buffer.max(1);
        self
    }
}
