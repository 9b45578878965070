//! Data layer for the House Cup leaderboard.
//!
//! The event store is an append-only ledger of scored events keyed by
//! producer id. It answers one kind of read: per-house point sums,
//! optionally restricted to events newer than a cutoff. Window filling
//! and snapshot assembly happen upstream in the aggregator.
//!
//! # Architecture
//!
//! ```text
//! Ingestion worker
//!     |
//!     +-- insert --------> EventStore (trait)
//!                             |-- SqliteEventStore  (durable, house_points table)
//!                             +-- MemoryEventStore  (volatile, tests / ephemeral runs)
//! Aggregator
//!     |
//!     +-- sum_by_category -> EventStore
//! ```
//!
//! # Modules
//!
//! - [`sqlite`] -- `SQLite` connection pool, configuration, migrations
//! - [`event_store`] -- The [`EventStore`] trait and its `SQLite` implementation
//! - [`memory_store`] -- In-memory [`EventStore`]
//! - [`error`] -- Shared error types

pub mod error;
pub mod event_store;
pub mod memory_store;
pub mod sqlite;

// Re-export primary types for convenience.
pub use error::StoreError;
pub use event_store::{EventStore, SqliteEventStore};
pub use memory_store::MemoryEventStore;
pub use sqlite::{SqliteConfig, SqliteDb};
