//! Windowed per-house totals computed from the event store.
//!
//! The aggregator holds no state of its own. Every call reads the store,
//! so two calls a moment apart over a busy window can legitimately
//! differ. Rolling windows are anchored at the wall clock when the call
//! is made, not at the newest event.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use house_cup_db::{EventStore, StoreError};
use house_cup_types::{LeaderboardSnapshot, Window, WindowTotals};

/// Computes [`WindowTotals`] and [`LeaderboardSnapshot`]s on demand.
#[derive(Clone)]
pub struct Aggregator {
    store: Arc<dyn EventStore>,
}

impl Aggregator {
    /// Create an aggregator over the given store.
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Totals for one window, measured back from now.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store read fails.
    pub async fn totals(&self, window: Window) -> Result<WindowTotals, StoreError> {
        self.totals_at(window, Utc::now()).await
    }

    /// Totals for one window, measured back from `now`.
    ///
    /// All four houses are present in the result; houses without matching
    /// events are zero.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store read fails.
    pub async fn totals_at(
        &self,
        window: Window,
        now: DateTime<Utc>,
    ) -> Result<WindowTotals, StoreError> {
        let sums = self.store.sum_by_category(cutoff(window, now)).await?;
        Ok(sums.into_iter().collect())
    }

    /// Totals for every window, all measured from the same instant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if any store read fails.
    pub async fn snapshot(&self) -> Result<LeaderboardSnapshot, StoreError> {
        self.snapshot_at(Utc::now()).await
    }

    /// Totals for every window, measured back from `now`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if any store read fails.
    pub async fn snapshot_at(&self, now: DateTime<Utc>) -> Result<LeaderboardSnapshot, StoreError> {
        let mut snapshot = LeaderboardSnapshot::default();
        for window in Window::ALL {
            *snapshot.window_mut(window) = self.totals_at(window, now).await?;
        }
        Ok(snapshot)
    }
}

/// The exclusive lower bound on event timestamps for `window`.
fn cutoff(window: Window, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    window
        .span()
        .map(|span| now.checked_sub_signed(span).unwrap_or(DateTime::<Utc>::MIN_UTC))
}
