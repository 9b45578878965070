//! Event, totals, and wire structs for the House Cup leaderboard.
//!
//! [`RawEvent`] is what the producer hands over; it becomes a
//! [`ScoredEvent`] only after validation. [`WindowTotals`] and
//! [`LeaderboardSnapshot`] are derived read models recomputed on demand
//! and never persisted.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{House, Window};
use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// An immutable, validated point award.
///
/// `id` is the deduplication key. `timestamp` is producer-supplied and may
/// arrive out of order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ScoredEvent {
    /// Globally unique event identifier.
    pub id: String,
    /// House credited with the points.
    pub category: House,
    /// Signed point delta (negative for deductions).
    #[ts(type = "number")]
    pub points: i64,
    /// When the points were awarded (UTC).
    pub timestamp: DateTime<Utc>,
}

impl ScoredEvent {
    /// Check the invariants that types alone cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyId`] if the id is blank.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::EmptyId);
        }
        Ok(())
    }
}

/// An event exactly as the producer emitted it, before validation.
///
/// Fields are unchecked. Convert with [`ScoredEvent::try_from`] to get a
/// record the store will accept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Producer-assigned identifier.
    pub id: String,
    /// House code (`Gryff`, `Slyth`, `Raven`, `Huff`).
    pub category: String,
    /// Point delta as a JSON number.
    pub points: serde_json::Number,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}

impl TryFrom<RawEvent> for ScoredEvent {
    type Error = ValidationError;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        let category: House = raw.category.parse()?;

        let points = raw
            .points
            .as_i64()
            .ok_or_else(|| ValidationError::NonIntegerPoints(raw.points.to_string()))?;

        let timestamp = DateTime::parse_from_rfc3339(&raw.timestamp)
            .map_err(|e| ValidationError::InvalidTimestamp {
                raw: raw.timestamp.clone(),
                reason: e.to_string(),
            })?
            .with_timezone(&Utc);

        let event = Self {
            id: raw.id,
            category,
            points,
            timestamp,
        };
        event.validate()?;
        Ok(event)
    }
}

impl From<&ScoredEvent> for RawEvent {
    fn from(event: &ScoredEvent) -> Self {
        Self {
            id: event.id.clone(),
            category: event.category.code().to_owned(),
            points: serde_json::Number::from(event.points),
            timestamp: event.timestamp.to_rfc3339(),
        }
    }
}

// ---------------------------------------------------------------------------
// Totals
// ---------------------------------------------------------------------------

/// Per-house point sums for one window.
///
/// Every house is always present. Houses with no matching events carry
/// zero, and deserializing a partial map fills the gaps the same way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(from = "BTreeMap<House, i64>")]
#[ts(export, export_to = "bindings/")]
pub struct WindowTotals(#[ts(type = "Record<House, number>")] BTreeMap<House, i64>);

impl WindowTotals {
    /// Totals with every house at zero.
    pub fn zeroed() -> Self {
        Self(House::ALL.into_iter().map(|house| (house, 0)).collect())
    }

    /// Points for a single house.
    pub fn get(&self, house: House) -> i64 {
        self.0.get(&house).copied().unwrap_or(0)
    }

    /// Add `points` to `house`, saturating at the `i64` bounds.
    pub fn add(&mut self, house: House, points: i64) {
        let entry = self.0.entry(house).or_insert(0);
        *entry = entry.saturating_add(points);
    }

    /// Iterate over `(house, points)` in display order.
    pub fn iter(&self) -> impl Iterator<Item = (House, i64)> + '_ {
        self.0.iter().map(|(house, points)| (*house, *points))
    }
}

impl Default for WindowTotals {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl From<BTreeMap<House, i64>> for WindowTotals {
    fn from(sums: BTreeMap<House, i64>) -> Self {
        sums.into_iter().collect()
    }
}

impl FromIterator<(House, i64)> for WindowTotals {
    fn from_iter<I: IntoIterator<Item = (House, i64)>>(iter: I) -> Self {
        let mut totals = Self::zeroed();
        for (house, points) in iter {
            totals.add(house, points);
        }
        totals
    }
}

/// Totals for all three windows, keyed by window name on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LeaderboardSnapshot {
    /// Sums over the last five minutes.
    #[serde(rename = "5min")]
    pub last_5min: WindowTotals,
    /// Sums over the last hour.
    #[serde(rename = "1hour")]
    pub last_1hour: WindowTotals,
    /// Sums over every recorded event.
    pub all: WindowTotals,
}

impl LeaderboardSnapshot {
    /// Totals for one window.
    pub const fn window(&self, window: Window) -> &WindowTotals {
        match window {
            Window::Last5Min => &self.last_5min,
            Window::Last1Hour => &self.last_1hour,
            Window::AllTime => &self.all,
        }
    }

    /// Mutable totals for one window.
    pub fn window_mut(&mut self, window: Window) -> &mut WindowTotals {
        match window {
            Window::Last5Min => &mut self.last_5min,
            Window::Last1Hour => &mut self.last_1hour,
            Window::AllTime => &mut self.all,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire messages
// ---------------------------------------------------------------------------

/// A message pushed to live-feed subscribers.
///
/// Serialized as `{"event": "leaderboard_update", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum FeedMessage {
    /// Fresh totals for all three windows.
    LeaderboardUpdate(LeaderboardSnapshot),
}

/// Response body for `GET /api/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct IngestionStatus {
    /// Whether an ingestion worker is currently registered.
    pub active: bool,
}

/// Outcome reported by the start/stop control endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum ControlStatus {
    /// Ingestion is (now or already) running.
    Started,
    /// Ingestion is (now or already) stopped.
    Stopped,
}

/// Response body for `POST /api/start` and `POST /api/stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ControlResponse {
    /// The resulting control state.
    pub status: ControlStatus,
}
