//! Aggregation, broadcast, and ingestion control for the House Cup
//! leaderboard.
//!
//! Data flows one way: an [`EventProducer`] feeds the ingestion worker,
//! the worker writes to the event store, and every successful write asks
//! the [`BroadcastHub`] to push fresh totals to live subscribers. The
//! [`Aggregator`] reads the store on demand for both the hub and the query
//! API.
//!
//! # Modules
//!
//! - [`aggregator`] -- Windowed per-house totals from the event store.
//! - [`config`] -- Configuration loading from `house-cup-config.yaml` into
//!   strongly-typed structs.
//! - [`hub`] -- Subscriber registry and snapshot fan-out.
//! - [`ingestion`] -- Start/stop control of the single ingestion worker.
//! - [`producer`] -- [`EventProducer`] trait and built-in producers.
//!
//! [`Aggregator`]: aggregator::Aggregator
//! [`BroadcastHub`]: hub::BroadcastHub
//! [`EventProducer`]: producer::EventProducer

pub mod aggregator;
pub mod config;
pub mod hub;
pub mod ingestion;
pub mod producer;

pub use aggregator::Aggregator;
pub use config::{ConfigError, HouseCupConfig};
pub use hub::{BroadcastHub, ChannelSubscriber, DeliveryError, PublishReport, Subscriber};
pub use ingestion::{IngestionController, WorkerExit, WorkerReport};
pub use producer::{ChannelProducer, EventProducer, RandomProducer, StaticProducer};
