//! Read and delete queries, interval splitting, cursors and aggregation

use std::fmt;
use std::str::FromStr;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

mod aggregation;
mod cursor;
mod interval;

#[cfg(test)]
mod tests;

pub use aggregation::{AggregationChunk, AggregationResult};
pub use cursor::{CursorSink, QueryCursor};
pub use interval::{SubInterval, split_intervals};

use crate::kv::DataPoint;
use crate::storage::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Aggregation {
    None,
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

impl FromStr for Aggregation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NONE" => Ok(Aggregation::None),
            "MIN" => Ok(Aggregation::Min),
            "MAX" => Ok(Aggregation::Max),
            "SUM" => Ok(Aggregation::Sum),
            "AVG" => Ok(Aggregation::Avg),
            "COUNT" => Ok(Aggregation::Count),
            "" => Err(Error::InvalidQuery(
                "aggregation is missing; use NONE for raw reads".to_string(),
            )),
            other => Err(Error::InvalidQuery(format!(
                "unknown aggregation '{other}', expected NONE, MIN, MAX, SUM, AVG or COUNT"
            ))),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Aggregation::None => "NONE",
            Aggregation::Min => "MIN",
            Aggregation::Max => "MAX",
            Aggregation::Sum => "SUM",
            Aggregation::Avg => "AVG",
            Aggregation::Count => "COUNT",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Order {
    Asc,
    #[default]
    Desc,
}

impl FromStr for Order {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(Order::Asc),
            "DESC" => Ok(Order::Desc),
            other => Err(Error::InvalidQuery(format!(
                "unknown order '{other}', expected ASC or DESC"
            ))),
        }
    }
}

/// Calendar unit an aggregation range is cut along
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CalendarUnit {
    Day,
    /// Weeks starting on Sunday
    Week,
    /// Weeks starting on Monday
    WeekIso,
    Month,
    Quarter,
    Year,
}

impl CalendarUnit {
    /// Shortest possible length of one unit, DST shifts included
    pub(crate) fn min_len_ms(&self) -> i64 {
        const HOUR: i64 = 3_600_000;
        const DAY: i64 = 24 * HOUR;
        match self {
            CalendarUnit::Day => DAY - HOUR,
            CalendarUnit::Week | CalendarUnit::WeekIso => 7 * DAY - HOUR,
            CalendarUnit::Month => 28 * DAY - HOUR,
            CalendarUnit::Quarter => 89 * DAY - HOUR,
            CalendarUnit::Year => 365 * DAY - HOUR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IntervalType {
    /// Fixed width of `interval` milliseconds
    #[default]
    FixedMs,
    /// Calendar units in the query timezone; `interval` is ignored
    Calendar(CalendarUnit),
}

/// Range read of one key, raw or aggregated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadQuery {
    pub key: String,
    pub start_ts: i64,
    pub end_ts: i64,
    pub interval: i64,
    pub interval_type: IntervalType,
    /// IANA name, UTC when absent
    pub timezone: Option<String>,
    pub limit: usize,
    pub aggregation: Aggregation,
    pub order: Order,
}

impl ReadQuery {
    /// Raw read of up to `limit` rows
    pub fn raw(key: impl Into<String>, start_ts: i64, end_ts: i64, limit: usize, order: Order) -> Self {
        Self {
            key: key.into(),
            start_ts,
            end_ts,
            interval: 0,
            interval_type: IntervalType::FixedMs,
            timezone: None,
            limit,
            aggregation: Aggregation::None,
            order,
        }
    }

    /// Aggregated read with fixed-width sub-intervals
    pub fn aggregated(
        key: impl Into<String>,
        start_ts: i64,
        end_ts: i64,
        interval: i64,
        aggregation: Aggregation,
    ) -> Self {
        Self {
            key: key.into(),
            start_ts,
            end_ts,
            interval,
            interval_type: IntervalType::FixedMs,
            timezone: None,
            limit: usize::MAX,
            aggregation,
            order: Order::Asc,
        }
    }

    pub fn with_calendar(mut self, unit: CalendarUnit, timezone: Option<&str>) -> Self {
        self.interval_type = IntervalType::Calendar(unit);
        self.timezone = timezone.map(str::to_string);
        self
    }

    pub fn is_aggregated(&self) -> bool {
        self.aggregation != Aggregation::None
    }

    pub fn tz(&self) -> Result<Tz> {
        match self.timezone.as_deref() {
            None => Ok(Tz::UTC),
            Some(name) => name.parse::<Tz>().map_err(|e| {
                Error::InvalidQuery(format!("unknown timezone '{name}': {e}"))
            }),
        }
    }

    /// Upper bound on the sub-intervals an aggregated read is split into
    pub fn estimate_intervals(&self, min_step_ms: i64) -> u64 {
        let span = (self.end_ts as i128 - self.start_ts as i128).max(0);
        let step = match self.interval_type {
            IntervalType::FixedMs => self.interval.max(min_step_ms),
            IntervalType::Calendar(unit) => unit.min_len_ms(),
        } as i128;
        let count = match self.interval_type {
            IntervalType::FixedMs => (span + step - 1) / step,
            IntervalType::Calendar(_) => span / step + 1,
        };
        u64::try_from(count).unwrap_or(u64::MAX)
    }

    /// Reject malformed queries before any I/O
    pub fn validate(&self, max_intervals: u64, min_step_ms: i64) -> Result<()> {
        if self.key.trim().is_empty() {
            return Err(Error::InvalidQuery(
                "key must not be blank; pass the telemetry key to read".to_string(),
            ));
        }
        if self.start_ts > self.end_ts {
            return Err(Error::InvalidQuery(format!(
                "start {} is after end {}; swap the range bounds",
                self.start_ts, self.end_ts
            )));
        }
        if !self.is_aggregated() {
            if self.limit == 0 {
                return Err(Error::InvalidQuery(
                    "limit must be at least 1 for raw reads".to_string(),
                ));
            }
            return Ok(());
        }
        if self.interval_type == IntervalType::FixedMs && self.interval <= 0 {
            return Err(Error::InvalidQuery(format!(
                "interval must be positive for {} aggregation, got {}",
                self.aggregation, self.interval
            )));
        }
        self.tz()?;
        let count = self.estimate_intervals(min_step_ms);
        if count > max_intervals {
            return Err(Error::InvalidQuery(format!(
                "[{}, {}) with interval {} ms yields {count} sub-intervals, above the limit of {max_intervals}; increase the interval or shrink the time range",
                self.start_ts, self.end_ts, self.interval
            )));
        }
        Ok(())
    }
}

/// Removal of raw history over `[start_ts, end_ts)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteQuery {
    pub key: String,
    pub start_ts: i64,
    pub end_ts: i64,
    /// Also drop the latest value when its timestamp falls in the range
    pub delete_latest: bool,
    /// After dropping the latest value, promote the newest older point
    pub rewrite_latest_if_deleted: bool,
}

impl DeleteQuery {
    pub fn new(key: impl Into<String>, start_ts: i64, end_ts: i64) -> Self {
        Self {
            key: key.into(),
            start_ts,
            end_ts,
            delete_latest: true,
            rewrite_latest_if_deleted: false,
        }
    }

    pub fn with_rewrite(mut self, rewrite: bool) -> Self {
        self.rewrite_latest_if_deleted = rewrite;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.key.trim().is_empty() {
            return Err(Error::InvalidQuery(
                "key must not be blank; pass the telemetry key to delete".to_string(),
            ));
        }
        if self.start_ts > self.end_ts {
            return Err(Error::InvalidQuery(format!(
                "start {} is after end {}; swap the range bounds",
                self.start_ts, self.end_ts
            )));
        }
        Ok(())
    }

    /// Whether a latest value stamped at `ts` is affected. Unlike the raw
    /// delete, the window is closed at both ends.
    pub(crate) fn affects_latest(&self, ts: i64) -> bool {
        ts >= self.start_ts && ts <= self.end_ts
    }
}

/// Rows of one read plus the newest timestamp they cover
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadResult {
    pub key: String,
    pub data: Vec<DataPoint>,
    /// Max timestamp seen, 0 when empty
    pub last_entry_ts: i64,
    /// Sub-intervals dropped because their chunks could not be merged
    pub failed_intervals: usize,
}

impl ReadResult {
    pub fn new(key: impl Into<String>, data: Vec<DataPoint>) -> Self {
        let last_entry_ts = data.iter().map(|p| p.ts).max().unwrap_or(0);
        Self {
            key: key.into(),
            data,
            last_entry_ts,
            failed_intervals: 0,
        }
    }

    pub fn is_partial(&self) -> bool {
        self.failed_intervals > 0
    }
}

/// Outcome of removing a latest value
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LatestRemoval {
    pub key: String,
    pub removed: bool,
    /// Point promoted to latest by the rewrite
    pub data: Option<DataPoint>,
    pub version: Option<i64>,
}
