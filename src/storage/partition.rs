use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};

use super::{Error, PartitionGranularity, Result};

/// Bucket used for every row when partitioning is indefinite
pub const INDEFINITE_PARTITION: i64 = 0;

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

fn to_datetime(ts: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ts)
        .ok_or_else(|| Error::InvalidTimestamp(format!("{ts} ms is outside the calendar range")))
}

fn month_start(year: i32, month: u32) -> Result<i64> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
        .ok_or_else(|| Error::InvalidTimestamp(format!("no month start for {year}-{month}")))
}

impl PartitionGranularity {
    /// Whether every row shares one constant bucket
    pub fn is_fixed(&self) -> bool {
        matches!(self, PartitionGranularity::Indefinite)
    }

    /// Truncate `ts` in UTC to the start of its bucket
    pub fn partition_ts(&self, ts: i64) -> Result<i64> {
        match self {
            PartitionGranularity::Minute => Ok(ts - ts.rem_euclid(MINUTE_MS)),
            PartitionGranularity::Hour => Ok(ts - ts.rem_euclid(HOUR_MS)),
            PartitionGranularity::Day => Ok(ts - ts.rem_euclid(DAY_MS)),
            PartitionGranularity::Month => {
                let dt = to_datetime(ts)?;
                month_start(dt.year(), dt.month())
            }
            PartitionGranularity::Year => {
                let dt = to_datetime(ts)?;
                month_start(dt.year(), 1)
            }
            PartitionGranularity::Indefinite => Ok(INDEFINITE_PARTITION),
        }
    }

    /// Start of the bucket following `bucket`, `None` for the fixed bucket
    pub fn next_partition(&self, bucket: i64) -> Result<Option<i64>> {
        let months = match self {
            PartitionGranularity::Minute => return Ok(bucket.checked_add(MINUTE_MS)),
            PartitionGranularity::Hour => return Ok(bucket.checked_add(HOUR_MS)),
            PartitionGranularity::Day => return Ok(bucket.checked_add(DAY_MS)),
            PartitionGranularity::Month => Months::new(1),
            PartitionGranularity::Year => Months::new(12),
            PartitionGranularity::Indefinite => return Ok(None),
        };
        Ok(to_datetime(bucket)?
            .checked_add_months(months)
            .map(|dt| dt.timestamp_millis()))
    }

    /// Upper bound on the bucket count between two buckets, inclusive
    pub fn estimate_count(&self, min_partition: i64, max_partition: i64) -> u64 {
        if max_partition < min_partition {
            return 0;
        }
        let span = (max_partition as i128) - (min_partition as i128);
        let width = match self {
            PartitionGranularity::Minute => MINUTE_MS,
            PartitionGranularity::Hour => HOUR_MS,
            PartitionGranularity::Day => DAY_MS,
            PartitionGranularity::Month => 28 * DAY_MS,
            PartitionGranularity::Year => 365 * DAY_MS,
            PartitionGranularity::Indefinite => return 1,
        } as i128;
        u64::try_from(span / width + 1).unwrap_or(u64::MAX)
    }

    /// Every bucket between the buckets of `min_ts` and `max_ts`, oldest first
    pub fn enumerate(&self, min_ts: i64, max_ts: i64) -> Result<Vec<i64>> {
        if self.is_fixed() {
            return Ok(vec![INDEFINITE_PARTITION]);
        }
        if max_ts < min_ts {
            return Err(Error::InvalidPartition(format!(
                "range end {max_ts} is before start {min_ts}"
            )));
        }
        let last = self.partition_ts(max_ts)?;
        let mut current = Some(self.partition_ts(min_ts)?);
        let mut partitions = Vec::new();
        while let Some(bucket) = current {
            if bucket > last {
                break;
            }
            partitions.push(bucket);
            current = self.next_partition(bucket)?;
        }
        Ok(partitions)
    }
}
