use chrono::{DateTime, Datelike, Days, Months, NaiveDate, TimeDelta, TimeZone};
use chrono_tz::Tz;

use super::{CalendarUnit, IntervalType, ReadQuery};
use crate::storage::{Error, Result};

/// Half-open slice `[start_ts, end_ts)` of an aggregated read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubInterval {
    pub start_ts: i64,
    pub end_ts: i64,
}

impl SubInterval {
    /// Timestamp the aggregated point is reported at
    pub fn midpoint(&self) -> i64 {
        self.start_ts + (self.end_ts - self.start_ts) / 2
    }
}

/// Start of the calendar unit following the one containing `local`
fn next_boundary(unit: CalendarUnit, local: &DateTime<Tz>) -> Option<NaiveDate> {
    let date = local.date_naive();
    match unit {
        CalendarUnit::Day => date.succ_opt(),
        CalendarUnit::Week => {
            let offset = 7 - date.weekday().num_days_from_sunday();
            date.checked_add_days(Days::new(offset as u64))
        }
        CalendarUnit::WeekIso => {
            let offset = 7 - date.weekday().num_days_from_monday();
            date.checked_add_days(Days::new(offset as u64))
        }
        CalendarUnit::Month => date.with_day(1)?.checked_add_months(Months::new(1)),
        CalendarUnit::Quarter => {
            let first_month = date.month0() / 3 * 3 + 1;
            NaiveDate::from_ymd_opt(date.year(), first_month, 1)?.checked_add_months(Months::new(3))
        }
        CalendarUnit::Year => NaiveDate::from_ymd_opt(date.year() + 1, 1, 1),
    }
}

/// Local midnight of `date` as epoch millis; a midnight skipped by a DST
/// jump resolves to the first valid instant after it
fn local_midnight(tz: &Tz, date: NaiveDate) -> Option<i64> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    let mut candidate = midnight;
    for _ in 0..4 {
        if let Some(dt) = tz.from_local_datetime(&candidate).earliest() {
            return Some(dt.timestamp_millis());
        }
        candidate += TimeDelta::minutes(30);
    }
    None
}

fn calendar_end(unit: CalendarUnit, tz: &Tz, start_ts: i64) -> Result<i64> {
    let local = tz
        .timestamp_millis_opt(start_ts)
        .single()
        .ok_or_else(|| Error::InvalidTimestamp(format!("{start_ts} ms has no local time in {tz}")))?;
    next_boundary(unit, &local)
        .and_then(|date| local_midnight(tz, date))
        .ok_or_else(|| Error::InvalidTimestamp(format!("no {unit:?} boundary after {start_ts} in {tz}")))
}

/// Cut the query range into consecutive sub-intervals covering
/// `[start_ts, end_ts)`. Fixed steps are at least `min_step_ms` wide; the
/// last slice is clipped to the range end.
pub fn split_intervals(query: &ReadQuery, min_step_ms: i64) -> Result<Vec<SubInterval>> {
    let tz = query.tz()?;
    let mut intervals = Vec::new();
    let mut start = query.start_ts;
    while start < query.end_ts {
        let next = match query.interval_type {
            IntervalType::FixedMs => start.saturating_add(query.interval.max(min_step_ms)),
            IntervalType::Calendar(unit) => calendar_end(unit, &tz, start)?,
        };
        if next <= start {
            return Err(Error::InvalidQuery(format!(
                "interval starting at {start} does not advance"
            )));
        }
        let end = next.min(query.end_ts);
        intervals.push(SubInterval { start_ts: start, end_ts: end });
        start = end;
    }
    Ok(intervals)
}
