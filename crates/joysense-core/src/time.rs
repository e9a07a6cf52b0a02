//! Timestamp parsing/formatting and date ranges
//!
//! The backend stores naive local timestamps. Filters are sent as
//! `YYYY-MM-DD HH:MM:SS`; responses may use a `T` separator, fractional
//! seconds or an explicit offset, all of which are accepted.

use core::time::Duration;

use chrono::{DateTime, DurationRound, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

/// Format used for start/end filters on the read API
pub const WIRE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const ACCEPTED_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Format a timestamp for a query filter
pub fn format_wire(timestamp: &NaiveDateTime) -> String {
    timestamp.format(WIRE_FORMAT).to_string()
}

/// Parse a timestamp as returned by the backend.
///
/// Offsets are dropped, keeping the wall-clock time as written.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();

    ACCEPTED_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.naive_local())
        })
}

/// Inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateRange {
    /// Create a range, swapping the bounds if given in reverse
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// The `days` days ending at `end`
    pub fn last_days(end: NaiveDateTime, days: u32) -> Self {
        Self {
            start: end - TimeDelta::days(i64::from(days)),
            end,
        }
    }

    pub fn span(&self) -> TimeDelta {
        self.end - self.start
    }

    pub fn contains(&self, timestamp: &NaiveDateTime) -> bool {
        self.start <= *timestamp && *timestamp <= self.end
    }

    /// True when the range touches more than one calendar day
    pub fn spans_multiple_days(&self) -> bool {
        self.start.date() != self.end.date()
    }
}

/// Round `timestamp` down to a multiple of `grain` since the epoch.
///
/// A zero or unrepresentable grain leaves the timestamp unchanged.
pub fn floor_to(timestamp: NaiveDateTime, grain: Duration) -> NaiveDateTime {
    TimeDelta::from_std(grain)
        .ok()
        .filter(|grain| *grain > TimeDelta::zero())
        .and_then(|grain| timestamp.duration_trunc(grain).ok())
        .unwrap_or(timestamp)
}
