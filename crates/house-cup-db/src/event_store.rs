//! Event store operations for the append-only house points ledger.
//!
//! Events are the source of truth for every total the leaderboard shows.
//! Each [`ScoredEvent`] is written once under its producer-assigned id and
//! never updated or deleted. Totals are derived by summing points per
//! house, optionally restricted to events newer than a cutoff.
//!
//! [`EventStore`] is the seam the aggregator and ingestion worker depend
//! on. [`SqliteEventStore`] is the durable implementation;
//! [`MemoryEventStore`](crate::memory_store::MemoryEventStore) satisfies
//! the same contract without persistence.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use house_cup_types::{House, ScoredEvent};
use sqlx::SqlitePool;

use crate::error::StoreError;
use crate::sqlite::SqliteDb;

/// Append-only, uniquely keyed storage for scored events.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Record a new event.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Validation`] if the event is malformed; nothing is
    ///   recorded.
    /// - [`StoreError::DuplicateKey`] if an event with the same id already
    ///   exists; the stored event is left untouched.
    /// - Any other variant if the storage engine fails.
    async fn insert(&self, event: &ScoredEvent) -> Result<(), StoreError>;

    /// Sum points per house.
    ///
    /// With a cutoff, only events whose timestamp is strictly after it
    /// are counted. Timestamps and the cutoff are compared at microsecond
    /// precision. Houses with no matching events are absent from the
    /// map; filling them in is the caller's job.
    ///
    /// Totals saturate at the `i64` bounds rather than failing.
    ///
    /// # Errors
    ///
    /// Returns a storage-failure variant of [`StoreError`] if the read
    /// fails.
    async fn sum_by_category(
        &self,
        cutoff: Option<DateTime<Utc>>,
    ) -> Result<BTreeMap<House, i64>, StoreError>;

    /// Number of recorded events.
    ///
    /// # Errors
    ///
    /// Returns a storage-failure variant of [`StoreError`] if the read
    /// fails.
    async fn count(&self) -> Result<u64, StoreError>;
}

/// [`EventStore`] backed by the `house_points` table in `SQLite`.
///
/// Timestamps are stored as microseconds since the Unix epoch so that the
/// cutoff comparison is a plain integer comparison.
#[derive(Clone)]
pub struct SqliteEventStore {
    pool: SqlitePool,
}

impl SqliteEventStore {
    /// Create a new event store sharing the given database's pool.
    pub fn new(db: &SqliteDb) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }
}

impl SqliteEventStore {
    /// Sum per house with saturating arithmetic, in id order.
    ///
    /// `SQLite`'s `SUM` errors once a total leaves the `i64` range, so this
    /// path reads the individual points instead. Walking rows in id order
    /// matches the order [`MemoryEventStore`](crate::memory_store::MemoryEventStore)
    /// folds in.
    async fn saturating_sum(
        &self,
        cutoff_micros: Option<i64>,
    ) -> Result<BTreeMap<House, i64>, StoreError> {
        let rows: Vec<CategoryPointsRow> = match cutoff_micros {
            Some(cutoff) => {
                sqlx::query_as(
                    r"SELECT category, points
                      FROM house_points
                      WHERE timestamp > ?1
                      ORDER BY id",
                )
                .bind(cutoff)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    r"SELECT category, points
                      FROM house_points
                      ORDER BY id",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut sums: BTreeMap<House, i64> = BTreeMap::new();
        for row in rows {
            let house: House = row.category.parse()?;
            let entry = sums.entry(house).or_insert(0);
            *entry = entry.saturating_add(row.points);
        }
        Ok(sums)
    }
}

/// Whether a `SQLite` error message reports an integer overflow in `SUM`.
fn is_integer_overflow(message: &str) -> bool {
    message.contains("integer overflow")
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn insert(&self, event: &ScoredEvent) -> Result<(), StoreError> {
        event.validate()?;

        let result = sqlx::query(
            r"INSERT INTO house_points (id, category, points, timestamp)
              VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&event.id)
        .bind(event.category.code())
        .bind(event.points)
        .bind(event.timestamp.timestamp_micros())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                tracing::debug!(event_id = %event.id, house = %event.category, "Inserted event");
                Ok(())
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StoreError::DuplicateKey(event.id.clone()))
            }
            Err(e) => Err(StoreError::Sqlite(e)),
        }
    }

    async fn sum_by_category(
        &self,
        cutoff: Option<DateTime<Utc>>,
    ) -> Result<BTreeMap<House, i64>, StoreError> {
        let cutoff = cutoff.as_ref().map(DateTime::timestamp_micros);
        let grouped: Result<Vec<CategorySumRow>, sqlx::Error> = match cutoff {
            Some(cutoff) => {
                sqlx::query_as(
                    r"SELECT category, SUM(points) AS total_points
                      FROM house_points
                      WHERE timestamp > ?1
                      GROUP BY category",
                )
                .bind(cutoff)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as(
                    r"SELECT category, SUM(points) AS total_points
                      FROM house_points
                      GROUP BY category",
                )
                .fetch_all(&self.pool)
                .await
            }
        };

        match grouped {
            Ok(rows) => {
                let mut sums = BTreeMap::new();
                for row in rows {
                    let house: House = row.category.parse()?;
                    sums.insert(house, row.total_points);
                }
                Ok(sums)
            }
            Err(sqlx::Error::Database(db_err)) if is_integer_overflow(db_err.message()) => {
                tracing::debug!("SUM overflowed, folding points row by row");
                self.saturating_sum(cutoff).await
            }
            Err(e) => Err(StoreError::Sqlite(e)),
        }
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM house_points")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

/// One row of a `GROUP BY category` aggregate.
///
/// Uses runtime types rather than compile-time checked types to
/// avoid requiring a live database during builds.
#[derive(Debug, Clone, sqlx::FromRow)]
struct CategorySumRow {
    /// House code as stored.
    category: String,
    /// Sum of points for the house.
    total_points: i64,
}

/// One event's house and points, for the saturating fallback.
#[derive(Debug, Clone, sqlx::FromRow)]
struct CategoryPointsRow {
    /// House code as stored.
    category: String,
    /// Points carried by the event.
    points: i64,
}
