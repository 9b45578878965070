//! Validation errors for events arriving from the producer.

/// Reasons a raw or scored event is rejected before it reaches storage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The event id was empty or whitespace.
    #[error("event id must not be empty")]
    EmptyId,

    /// The category is not one of the four houses.
    #[error("unknown house code: {0:?}")]
    UnknownHouse(String),

    /// The points value was not a finite integer.
    #[error("points must be a finite integer, got {0}")]
    NonIntegerPoints(String),

    /// The timestamp could not be parsed as an RFC 3339 instant.
    #[error("invalid timestamp {raw:?}: {reason}")]
    InvalidTimestamp {
        /// The timestamp text as received.
        raw: String,
        /// Why parsing failed.
        reason: String,
    },
}
