use futures_util::future::try_join_all;
use tokio::sync::mpsc;

use super::TimeseriesDao;
use crate::kv::{DataPoint, EntityId};
use crate::query::{
    Aggregation, AggregationResult, CursorSink, Order, QueryCursor, ReadQuery, ReadResult, SubInterval,
    split_intervals,
};
use crate::storage::{Error, Params, Result, StatementKey, rows};

/// What one aggregated sub-interval contributed, with the newest row
/// timestamp it saw
enum IntervalOutcome {
    Point(DataPoint, Option<i64>),
    Empty(Option<i64>),
    Failed,
}

impl TimeseriesDao {
    fn validate(&self, query: &ReadQuery) -> Result<()> {
        query.validate(
            self.config.max_aggregation_intervals,
            self.config.min_aggregation_step_ms,
        )
    }

    /// Run several reads of one entity concurrently. All queries are
    /// validated before any of them touches storage.
    pub async fn find_all_async(
        &self,
        entity: &EntityId,
        queries: &[ReadQuery],
    ) -> Result<Vec<ReadResult>> {
        for query in queries {
            self.validate(query)?;
        }
        try_join_all(queries.iter().map(|query| self.read(entity, query))).await
    }

    pub async fn find_all(&self, entity: &EntityId, query: &ReadQuery) -> Result<ReadResult> {
        self.validate(query)?;
        self.read(entity, query).await
    }

    /// Stream the rows of `query` into `tx` as partitions are read, returning
    /// how many were sent
    pub async fn find_all_streaming(
        &self,
        entity: &EntityId,
        query: &ReadQuery,
        tx: mpsc::Sender<DataPoint>,
    ) -> Result<usize> {
        self.validate(query)?;
        if query.is_aggregated() {
            let result = self.find_and_aggregate(entity, query).await?;
            let sent = result.data.len();
            for point in result.data {
                tx.send(point)
                    .await
                    .map_err(|_| Error::Worker("read stream receiver dropped".to_string()))?;
            }
            return Ok(sent);
        }
        let partitions = self
            .partitions_for(entity, &query.key, query.start_ts, query.end_ts)
            .await?;
        let mut cursor = QueryCursor::new(query, partitions, CursorSink::Channel(tx));
        self.drain(entity, &mut cursor).await?;
        Ok(cursor.rows())
    }

    async fn read(&self, entity: &EntityId, query: &ReadQuery) -> Result<ReadResult> {
        if query.is_aggregated() {
            self.find_and_aggregate(entity, query).await
        } else {
            self.find_raw(entity, query).await
        }
    }

    pub(super) async fn find_raw(&self, entity: &EntityId, query: &ReadQuery) -> Result<ReadResult> {
        let partitions = self
            .partitions_for(entity, &query.key, query.start_ts, query.end_ts)
            .await?;
        let mut cursor = QueryCursor::new(query, partitions, CursorSink::Buffer(Vec::new()));
        self.drain(entity, &mut cursor).await?;
        let last_entry_ts = cursor.last_entry_ts();
        Ok(ReadResult {
            key: query.key.clone(),
            data: cursor.into_data(),
            last_entry_ts,
            failed_intervals: 0,
        })
    }

    /// Read partitions one at a time until the cursor is full or exhausted
    async fn drain(&self, entity: &EntityId, cursor: &mut QueryCursor) -> Result<()> {
        let statement = StatementKey::fetch(Aggregation::None, cursor.order);
        while !cursor.is_full() {
            let Some(partition) = cursor.next_partition() else {
                break;
            };
            log::trace!("Fetching partition {partition} of {entity} key '{}'", cursor.key);
            let params = Params {
                partition: Some(partition),
                start_ts: Some(cursor.start_ts),
                end_ts: Some(cursor.end_ts),
                limit: cursor.current_limit(),
                ..Params::series(entity, &cursor.key)
            };
            let batch = self.execute(statement, params).await?;
            let points = self.pool.run(move || rows::decode_points(&batch)).await?;
            cursor.add_data(points).await?;
        }
        Ok(())
    }

    async fn find_and_aggregate(&self, entity: &EntityId, query: &ReadQuery) -> Result<ReadResult> {
        let intervals = split_intervals(query, self.config.min_aggregation_step_ms)?;
        let outcomes = try_join_all(
            intervals
                .iter()
                .map(|interval| self.aggregate_interval(entity, query, *interval)),
        )
        .await?;

        let mut result = ReadResult::new(query.key.clone(), Vec::new());
        let mut observed = None;
        for outcome in outcomes {
            let seen = match outcome {
                IntervalOutcome::Point(point, seen) => {
                    result.data.push(point);
                    seen
                }
                IntervalOutcome::Empty(seen) => seen,
                IntervalOutcome::Failed => {
                    result.failed_intervals += 1;
                    None
                }
            };
            observed = observed.max(seen);
        }
        if query.order == Order::Desc {
            result.data.reverse();
        }
        result.last_entry_ts = observed.unwrap_or(0);
        Ok(result)
    }

    /// Fetch one chunk per partition and merge them off the I/O path.
    /// Storage failures propagate; a merge failure only empties this slice.
    async fn aggregate_interval(
        &self,
        entity: &EntityId,
        query: &ReadQuery,
        interval: SubInterval,
    ) -> Result<IntervalOutcome> {
        let partitions = self
            .partitions_for(entity, &query.key, interval.start_ts, interval.end_ts)
            .await?;
        let statement = StatementKey::fetch(query.aggregation, Order::Asc);
        let batches = try_join_all(partitions.into_iter().map(|partition| {
            let params = Params {
                partition: Some(partition),
                start_ts: Some(interval.start_ts),
                end_ts: Some(interval.end_ts),
                ..Params::series(entity, &query.key)
            };
            self.execute(statement, params)
        }))
        .await?;

        let aggregation = query.aggregation;
        let key = query.key.clone();
        let ts = interval.midpoint();
        let merged = self
            .pool
            .run(move || {
                let mut result = AggregationResult::new(aggregation);
                for batch in &batches {
                    for chunk in rows::decode_chunks(batch)? {
                        result.merge(&chunk)?;
                    }
                }
                Ok((result.finalize(&key, ts), result.max_ts()))
            })
            .await;

        Ok(match merged {
            Ok((Some(point), seen)) => IntervalOutcome::Point(point, seen),
            Ok((None, seen)) => IntervalOutcome::Empty(seen),
            Err(e) => {
                log::warn!(
                    "Dropping {} of {entity} key '{}' over [{}, {}): {e}",
                    query.aggregation,
                    query.key,
                    interval.start_ts,
                    interval.end_ts
                );
                IntervalOutcome::Failed
            }
        })
    }
}
