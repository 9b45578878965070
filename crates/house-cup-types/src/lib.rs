//! Shared type definitions for the House Cup leaderboard.
//!
//! This crate is the single source of truth for the types that cross crate
//! boundaries: the events the producer emits, the totals the store and
//! aggregator compute, and the messages the observer pushes to the
//! dashboard. Types flow downstream to `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for runtime identifiers
//! - [`enums`] -- Houses and aggregation windows
//! - [`structs`] -- Events, window totals, snapshots, wire messages
//! - [`error`] -- Event validation errors

pub mod enums;
pub mod error;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{House, Window};
pub use error::ValidationError;
pub use ids::{SubscriberId, WorkerId};
pub use structs::{
    ControlResponse, ControlStatus, FeedMessage, IngestionStatus, LeaderboardSnapshot, RawEvent,
    ScoredEvent, WindowTotals,
};
