//! Error types for the data layer.
//!
//! [`StoreError`] separates the outcomes the ingestion worker treats
//! differently: a rejected record ([`StoreError::Validation`]), an id
//! collision ([`StoreError::DuplicateKey`]), and a failure of the
//! underlying storage engine (everything else).

use house_cup_types::ValidationError;

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The event failed validation and was not recorded.
    #[error("invalid event: {0}")]
    Validation(#[from] ValidationError),

    /// An event with this id is already recorded.
    #[error("duplicate event id: {0}")]
    DuplicateKey(String),

    /// A `SQLite` operation failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    /// A `SQLite` migration failed.
    #[error("SQLite migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Whether this error comes from the storage engine rather than from
    /// the event itself.
    pub const fn is_storage_failure(&self) -> bool {
        matches!(self, Self::Sqlite(_) | Self::Migration(_) | Self::Config(_))
    }
}
