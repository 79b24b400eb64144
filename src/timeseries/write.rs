use futures_util::future::join_all;

use super::TimeseriesDao;
use super::retention::{compute_ttl, data_point_days};
use crate::kv::{DataPoint, EntityId, TenantId};
use crate::query::{DeleteQuery, LatestRemoval, QueryCursor};
use crate::storage::{Error, Operation, Params, Result, StatementKey, rows};

/// Outcome of a batch save
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveResult {
    pub data_point_days: u64,
    /// Versions assigned to the latest values, in point order
    pub versions: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteResult {
    pub key: String,
    pub deleted_rows: u64,
    pub latest: Option<LatestRemoval>,
}

impl TimeseriesDao {
    /// Write one raw row, returning its data-point-days
    pub async fn save(&self, entity: &EntityId, point: &DataPoint, ttl_secs: i64) -> Result<u64> {
        let ttl = compute_ttl(ttl_secs, self.config.system_ttl_secs);
        let partition = self.config.partition_granularity.partition_ts(point.ts)?;
        let operation = if ttl > 0 {
            Operation::InsertTsTtl
        } else {
            Operation::InsertTs
        };
        let params = Params {
            partition: Some(partition),
            ts: Some(point.ts),
            value: Some(point.value.clone()),
            ttl_secs: (ttl > 0).then_some(ttl),
            ..Params::series(entity, &point.key)
        };
        self.execute(StatementKey::typed(operation, point.data_type()), params)
            .await?;
        Ok(data_point_days(point.data_points(), ttl))
    }

    /// Record the bucket of `ts` in the marker table unless already known.
    /// Returns the number of markers written.
    pub async fn save_partition(&self, entity: &EntityId, key: &str, ts: i64) -> Result<u64> {
        let granularity = self.config.partition_granularity;
        if granularity.is_fixed() {
            return Ok(0);
        }
        let partition = granularity.partition_ts(ts)?;
        if self.partitions.has(entity, key, partition) {
            log::debug!("Partition {partition} of {entity} key '{key}' already recorded");
            return Ok(0);
        }
        let ttl = self.config.system_ttl_secs;
        let operation = if ttl > 0 {
            Operation::InsertPartitionTtl
        } else {
            Operation::InsertPartition
        };
        let params = Params {
            partition: Some(partition),
            ttl_secs: (ttl > 0).then_some(ttl),
            ..Params::series(entity, key)
        };
        self.execute(StatementKey::new(operation), params).await?;
        self.partitions.remember(entity, key, partition);
        Ok(1)
    }

    async fn save_raw(&self, entity: &EntityId, point: &DataPoint, ttl_secs: i64) -> Result<u64> {
        if !self.config.save_ts {
            return Ok(0);
        }
        let (marker, days) = tokio::join!(
            self.save_partition(entity, &point.key, point.ts),
            self.save(entity, point, ttl_secs)
        );
        marker?;
        days
    }

    async fn save_current(
        &self,
        tenant: TenantId,
        entity: &EntityId,
        point: &DataPoint,
    ) -> Result<Option<i64>> {
        if !self.config.save_latest {
            return Ok(None);
        }
        self.save_latest(tenant, entity, point).await.map(Some)
    }

    /// Save points with their partition markers and latest values.
    ///
    /// Every sub-write runs to completion even when another fails; the first
    /// failure is returned afterwards and completed writes stay in place.
    pub async fn save_all(
        &self,
        tenant: TenantId,
        entity: &EntityId,
        points: &[DataPoint],
        ttl_secs: i64,
    ) -> Result<SaveResult> {
        let writes = points.iter().map(|point| async move {
            tokio::join!(
                self.save_raw(entity, point, ttl_secs),
                self.save_current(tenant, entity, point)
            )
        });

        let mut result = SaveResult::default();
        let mut failure: Option<Error> = None;
        for (raw, latest) in join_all(writes).await {
            match raw {
                Ok(days) => result.data_point_days += days,
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
            match latest {
                Ok(Some(version)) => result.versions.push(version),
                Ok(None) => {}
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(result),
        }
    }

    /// Delete raw rows of `query` partition by partition, returning the count
    pub async fn remove(&self, entity: &EntityId, query: &DeleteQuery) -> Result<u64> {
        query.validate()?;
        let partitions = self
            .partitions_for(entity, &query.key, query.start_ts, query.end_ts)
            .await?;
        let mut cursor = QueryCursor::for_delete(query, partitions);
        while let Some(partition) = cursor.next_partition() {
            let params = Params {
                partition: Some(partition),
                start_ts: Some(cursor.start_ts),
                end_ts: Some(cursor.end_ts),
                ..Params::series(entity, &cursor.key)
            };
            let batch = self
                .execute(StatementKey::new(Operation::DeleteTs), params)
                .await?;
            cursor.add_deleted(rows::decode_mutation(&batch)?.rows);
        }
        Ok(cursor.rows() as u64)
    }

    /// Run every delete concurrently, dropping latest values where asked
    pub async fn remove_all(
        &self,
        tenant: TenantId,
        entity: &EntityId,
        queries: &[DeleteQuery],
    ) -> Result<Vec<DeleteResult>> {
        for query in queries {
            query.validate()?;
        }
        let deletes = queries.iter().map(|query| async move {
            let latest = async {
                if query.delete_latest {
                    self.remove_latest(tenant, entity, query).await.map(Some)
                } else {
                    Ok(None)
                }
            };
            let (deleted, latest) = tokio::join!(self.remove(entity, query), latest);
            Ok::<_, Error>(DeleteResult {
                key: query.key.clone(),
                deleted_rows: deleted?,
                latest: latest?,
            })
        });
        join_all(deletes).await.into_iter().collect()
    }
}
