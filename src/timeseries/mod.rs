//! Time-series access: writes, range reads, aggregation and latest values

use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use chrono::Utc;

mod latest;
mod read;
mod retention;
mod write;

#[cfg(test)]
mod tests;

pub use retention::{compute_ttl, data_point_days, spawn_retention_sweep};
pub use write::{DeleteResult, SaveResult};

use crate::kv::EntityId;
use crate::latest::{LatestCache, LatestListener, MokaLatestCache, NoopLatestCache, NoopListener};
use crate::query::{Aggregation, Order};
use crate::storage::{
    DecodePool, INDEFINITE_PARTITION, Operation, Params, PartitionCache, Result, StatementCache,
    StatementKey, StorageConfig, StorageDriver, rows,
};

/// Data access object for the partitioned time-series tables of one store.
///
/// Owns the prepared statement cache, the partition existence cache and
/// the decode pool; every operation runs on the caller's runtime.
pub struct TimeseriesDao {
    driver: Arc<dyn StorageDriver>,
    statements: StatementCache,
    partitions: PartitionCache,
    latest_cache: Arc<dyn LatestCache>,
    listener: Arc<dyn LatestListener>,
    pool: DecodePool,
    config: StorageConfig,
}

pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl TimeseriesDao {
    pub fn new(driver: Arc<dyn StorageDriver>, config: StorageConfig) -> Result<Self> {
        config.validate()?;
        let latest_cache: Arc<dyn LatestCache> = if config.latest_cache_size > 0 {
            Arc::new(MokaLatestCache::new(config.latest_cache_size))
        } else {
            Arc::new(NoopLatestCache)
        };
        Ok(Self {
            driver,
            statements: StatementCache::new(),
            partitions: PartitionCache::new(config.partitions_cache_size),
            latest_cache,
            listener: Arc::new(NoopListener),
            pool: DecodePool::new(config.decode_threads),
            config,
        })
    }

    pub fn with_latest_cache(mut self, cache: Arc<dyn LatestCache>) -> Self {
        self.latest_cache = cache;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn LatestListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Prepare the raw fetch statements ahead of the first read
    pub async fn warm_up(&self) -> Result<()> {
        for order in [Order::Asc, Order::Desc] {
            self.statements
                .get(self.driver.as_ref(), StatementKey::fetch(Aggregation::None, order))
                .await?;
        }
        Ok(())
    }

    pub fn prepared_statements(&self) -> usize {
        self.statements.prepared_count()
    }

    async fn execute(&self, key: StatementKey, params: Params) -> Result<RecordBatch> {
        let entity = params.entity;
        let series_key = params.key.clone();
        let result = match self.statements.bind(self.driver.as_ref(), key, params).await {
            Ok(statement) => self.driver.execute(statement).await,
            Err(e) => Err(e),
        };
        result.inspect_err(|e| {
            log::error!(
                "{:?} failed for {} key '{}': {e}",
                key.operation,
                entity.map(|id| id.to_string()).unwrap_or_else(|| "*".to_string()),
                series_key.as_deref().unwrap_or("*")
            );
        })
    }

    /// Buckets that may hold rows of `key` in `[start_ts, end_ts]`, oldest first
    async fn partitions_for(
        &self,
        entity: &EntityId,
        key: &str,
        start_ts: i64,
        end_ts: i64,
    ) -> Result<Vec<i64>> {
        let granularity = self.config.partition_granularity;
        if granularity.is_fixed() {
            return Ok(vec![INDEFINITE_PARTITION]);
        }
        let min_partition = granularity.partition_ts(start_ts)?;
        let max_partition = granularity.partition_ts(end_ts)?;
        if granularity.estimate_count(min_partition, max_partition)
            <= self.config.max_enumerated_partitions
        {
            return granularity.enumerate(start_ts, end_ts);
        }
        log::trace!(
            "Looking up partition markers of {entity} key '{key}' in [{min_partition}, {max_partition}]"
        );
        let params = Params {
            min_partition: Some(min_partition),
            max_partition: Some(max_partition),
            ..Params::series(entity, key)
        };
        let batch = self
            .execute(StatementKey::new(Operation::FetchPartitions), params)
            .await?;
        let mut partitions = rows::decode_partitions(&batch)?;
        partitions.sort_unstable();
        partitions.dedup();
        Ok(partitions)
    }
}
