use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{TimeseriesDao, now_ms};
use crate::storage::{Operation, Params, Result, StatementKey, rows};

const SECONDS_IN_DAY: i64 = 86_400;

/// Effective ttl of a write: the system ttl when none is requested,
/// otherwise the requested ttl capped by the system ttl
pub fn compute_ttl(ttl_secs: i64, system_ttl_secs: i64) -> i64 {
    let ttl_secs = ttl_secs.max(0);
    if ttl_secs == 0 {
        system_ttl_secs
    } else if system_ttl_secs > 0 {
        ttl_secs.min(system_ttl_secs)
    } else {
        ttl_secs
    }
}

/// Billing metric: points kept times days retained, at least one day
pub fn data_point_days(data_points: u64, ttl_secs: i64) -> u64 {
    let days = (ttl_secs / SECONDS_IN_DAY).max(1) as u64;
    data_points.saturating_mul(days)
}

impl TimeseriesDao {
    /// Delete raw rows older than the retention window. Stores that expire
    /// rows themselves are left alone.
    pub async fn cleanup(&self, system_ttl_secs: i64) -> Result<u64> {
        if system_ttl_secs <= 0 {
            return Ok(0);
        }
        if self.driver.supports_ttl() {
            log::debug!("Store expires rows natively, skipping cleanup");
            return Ok(0);
        }
        let cutoff = now_ms().saturating_sub(system_ttl_secs.saturating_mul(1000));
        let params = Params {
            ts: Some(cutoff),
            ..Default::default()
        };
        let batch = self
            .execute(StatementKey::new(Operation::DeleteExpired), params)
            .await?;
        let removed = rows::decode_mutation(&batch)?.rows;
        log::info!("Removed {removed} rows older than {cutoff}");
        Ok(removed)
    }
}

/// Run `cleanup` with the configured system ttl every `every`
pub fn spawn_retention_sweep(dao: Arc<TimeseriesDao>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = dao.cleanup(dao.config().system_ttl_secs).await {
                log::error!("Retention sweep failed: {e}");
            }
        }
    })
}
