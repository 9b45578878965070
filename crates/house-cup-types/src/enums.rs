//! Enumeration types for the House Cup leaderboard.
//!
//! [`House`] is the closed set of categories every scored event belongs
//! to. [`Window`] names the three fixed aggregation windows served by the
//! query surface and pushed over the live feed.

use core::fmt;
use core::str::FromStr;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// Houses
// ---------------------------------------------------------------------------

/// The category a scored event is credited to.
///
/// Serialized with the short codes the producer emits and the dashboard
/// keys on (`"Gryff"`, `"Slyth"`, `"Raven"`, `"Huff"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum House {
    /// Gryffindor.
    Gryff,
    /// Slytherin.
    Slyth,
    /// Ravenclaw.
    Raven,
    /// Hufflepuff.
    Huff,
}

impl House {
    /// Every house, in leaderboard display order.
    pub const ALL: [Self; 4] = [Self::Gryff, Self::Slyth, Self::Raven, Self::Huff];

    /// The short code used on the wire and in the database.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Gryff => "Gryff",
            Self::Slyth => "Slyth",
            Self::Raven => "Raven",
            Self::Huff => "Huff",
        }
    }
}

impl fmt::Display for House {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for House {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|house| house.code() == s)
            .ok_or_else(|| ValidationError::UnknownHouse(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Aggregation windows
// ---------------------------------------------------------------------------

/// A fixed aggregation window.
///
/// Rolling windows are measured back from the wall clock at query time,
/// not from the newest event timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Window {
    /// The last five minutes.
    #[serde(rename = "5min")]
    Last5Min,
    /// The last hour.
    #[serde(rename = "1hour")]
    Last1Hour,
    /// Every event ever recorded.
    #[default]
    #[serde(rename = "all")]
    AllTime,
}

impl Window {
    /// Every window, in the order they appear in a snapshot.
    pub const ALL: [Self; 3] = [Self::Last5Min, Self::Last1Hour, Self::AllTime];

    /// The query-string / snapshot key for this window.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Last5Min => "5min",
            Self::Last1Hour => "1hour",
            Self::AllTime => "all",
        }
    }

    /// Parse a window name, falling back to [`Window::AllTime`] for
    /// anything unrecognised.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw {
            "5min" => Self::Last5Min,
            "1hour" => Self::Last1Hour,
            _ => Self::AllTime,
        }
    }

    /// Length of the rolling window, or `None` for all-time.
    pub fn span(self) -> Option<TimeDelta> {
        match self {
            Self::Last5Min => Some(TimeDelta::minutes(5)),
            Self::Last1Hour => Some(TimeDelta::hours(1)),
            Self::AllTime => None,
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
