use std::collections::{BTreeMap, HashMap};

use arrow::array::{Array, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::compute::kernels::aggregate;
use arrow::compute::{SortOptions, and, filter_record_batch, take_record_batch};
use arrow::record_batch::RecordBatch;
use arrow_array::Scalar;
use arrow_ord::cmp::{gt_eq, lt};
use arrow_ord::sort::sort_to_indices;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use super::rows::{self, Mutation};
use super::statement::{BoundStatement, Operation, Params, PreparedStatement, StatementKey};
use super::{Error, Result, StorageDriver, schema};
use crate::kv::{DataPoint, DataType, EntityId, ScalarValue};
use crate::query::{Aggregation, AggregationChunk, Order};

type SeriesKey = (EntityId, String);

#[derive(Debug, Clone)]
struct StoredRow {
    value: ScalarValue,
    expires_at: Option<i64>,
}

#[derive(Default)]
struct MemoryState {
    rows: HashMap<SeriesKey, BTreeMap<i64, BTreeMap<i64, StoredRow>>>,
    partitions: HashMap<SeriesKey, BTreeMap<i64, Option<i64>>>,
    latest: HashMap<SeriesKey, DataPoint>,
    version: i64,
}

/// In-process table store answering every statement of the storage core.
///
/// Rows live in ordered maps per series and partition; reads are served as
/// Arrow batches filtered, sorted and aggregated with Arrow kernels.
pub struct InMemoryDriver {
    state: Mutex<MemoryState>,
    native_ttl: bool,
    failures: Mutex<HashMap<Operation, usize>>,
    executions: Mutex<HashMap<Operation, usize>>,
}

fn required<T: Clone>(value: &Option<T>, name: &str) -> Result<T> {
    value
        .clone()
        .ok_or_else(|| Error::backend(format!("statement is missing parameter '{name}'")))
}

fn series(params: &Params) -> Result<SeriesKey> {
    Ok((required(&params.entity, "entity")?, required(&params.key, "key")?))
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl InMemoryDriver {
    pub fn new() -> Self {
        Self::with_native_ttl(true)
    }

    /// With `native_ttl` off, expired rows stay visible until a cleanup sweep
    pub fn with_native_ttl(native_ttl: bool) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            native_ttl,
            failures: Mutex::new(HashMap::new()),
            executions: Mutex::new(HashMap::new()),
        }
    }

    /// Make the next execution of `operation` fail with a backend error
    pub fn fail_next(&self, operation: Operation) {
        *self.failures.lock().entry(operation).or_default() += 1;
    }

    pub fn executions(&self, operation: Operation) -> usize {
        self.executions.lock().get(&operation).copied().unwrap_or(0)
    }

    /// Raw rows stored for a series across all partitions, expired ones included
    pub fn row_count(&self, entity: &EntityId, key: &str) -> usize {
        self.state
            .lock()
            .rows
            .get(&(*entity, key.to_string()))
            .map(|parts| parts.values().map(BTreeMap::len).sum())
            .unwrap_or(0)
    }

    pub fn partition_markers(&self, entity: &EntityId, key: &str) -> Vec<i64> {
        self.state
            .lock()
            .partitions
            .get(&(*entity, key.to_string()))
            .map(|markers| markers.keys().copied().collect())
            .unwrap_or_default()
    }

    fn alive(&self, expires_at: Option<i64>, now: i64) -> bool {
        !self.native_ttl || expires_at.is_none_or(|at| at > now)
    }

    fn expiry(&self, key: &StatementKey, params: &Params, now: i64) -> Result<Option<i64>> {
        match key.operation {
            Operation::InsertTsTtl | Operation::InsertPartitionTtl => {
                let ttl = required(&params.ttl_secs, "ttl")?;
                Ok(Some(now.saturating_add(ttl.saturating_mul(1000))))
            }
            _ => Ok(None),
        }
    }

    fn insert_ts(&self, key: &StatementKey, params: &Params) -> Result<RecordBatch> {
        let series = series(params)?;
        let partition = required(&params.partition, "partition")?;
        let ts = required(&params.ts, "ts")?;
        let value = required(&params.value, "value")?;
        if let Some(expected) = key.data_type {
            if expected != value.data_type() {
                return Err(Error::backend(format!(
                    "{:?} value bound to a {:?} insert",
                    value.data_type(),
                    expected
                )));
            }
        }
        let expires_at = self.expiry(key, params, now_ms())?;
        self.state
            .lock()
            .rows
            .entry(series)
            .or_default()
            .entry(partition)
            .or_default()
            .insert(ts, StoredRow { value, expires_at });
        rows::encode_mutation(Mutation { rows: 1, version: None })
    }

    fn insert_partition(&self, key: &StatementKey, params: &Params) -> Result<RecordBatch> {
        let series = series(params)?;
        let partition = required(&params.partition, "partition")?;
        let expires_at = self.expiry(key, params, now_ms())?;
        self.state
            .lock()
            .partitions
            .entry(series)
            .or_default()
            .insert(partition, expires_at);
        rows::encode_mutation(Mutation { rows: 1, version: None })
    }

    fn upsert_latest(&self, params: &Params) -> Result<RecordBatch> {
        let series = series(params)?;
        let ts = required(&params.ts, "ts")?;
        let value = required(&params.value, "value")?;
        let mut state = self.state.lock();
        state.version += 1;
        let version = state.version;
        let point = DataPoint::new(series.1.clone(), ts, value).with_version(version);
        state.latest.insert(series, point);
        rows::encode_mutation(Mutation { rows: 1, version: Some(version) })
    }

    /// Live rows of one partition as an ascending batch
    fn partition_batch(&self, params: &Params) -> Result<RecordBatch> {
        let series = series(params)?;
        let partition = required(&params.partition, "partition")?;
        let now = now_ms();
        let state = self.state.lock();
        let points: Vec<DataPoint> = state
            .rows
            .get(&series)
            .and_then(|parts| parts.get(&partition))
            .map(|rows| {
                rows.iter()
                    .filter(|(_, row)| self.alive(row.expires_at, now))
                    .map(|(ts, row)| DataPoint::new(series.1.clone(), *ts, row.value.clone()))
                    .collect()
            })
            .unwrap_or_default();
        rows::encode_points(&points)
    }

    fn range_batch(&self, params: &Params) -> Result<RecordBatch> {
        let batch = self.partition_batch(params)?;
        let start = Scalar::new(ScalarValue::Int64(required(&params.start_ts, "start_ts")?).to_array(1));
        let end = Scalar::new(ScalarValue::Int64(required(&params.end_ts, "end_ts")?).to_array(1));
        let ts = rows::column::<Int64Array>(&batch, schema::TS)?;
        let mask = and(&gt_eq(ts, &start)?, &lt(ts, &end)?)?;
        Ok(filter_record_batch(&batch, &mask)?)
    }

    fn fetch_rows(&self, key: &StatementKey, params: &Params) -> Result<RecordBatch> {
        let mut batch = self.range_batch(params)?;
        if key.order == Order::Desc {
            let options = SortOptions {
                descending: true,
                nulls_first: false,
            };
            let ts = rows::column::<Int64Array>(&batch, schema::TS)?;
            let indices = sort_to_indices(ts, Some(options), None)?;
            batch = take_record_batch(&batch, &indices)?;
        }
        let limit = params.limit.unwrap_or(usize::MAX).min(batch.num_rows());
        Ok(batch.slice(0, limit))
    }

    fn fetch_chunk(&self, key: &StatementKey, params: &Params) -> Result<RecordBatch> {
        let batch = self.range_batch(params)?;
        let chunk = aggregate_chunk(&batch, key.aggregation)?;
        rows::encode_chunk(&chunk)
    }

    fn fetch_partitions(&self, params: &Params) -> Result<RecordBatch> {
        let series = series(params)?;
        let min = required(&params.min_partition, "min_partition")?;
        let max = required(&params.max_partition, "max_partition")?;
        if max < min {
            return rows::encode_partitions(&[]);
        }
        let now = now_ms();
        let state = self.state.lock();
        let partitions: Vec<i64> = state
            .partitions
            .get(&series)
            .map(|markers| {
                markers
                    .range(min..=max)
                    .filter(|(_, expires)| self.alive(**expires, now))
                    .map(|(p, _)| *p)
                    .collect()
            })
            .unwrap_or_default();
        rows::encode_partitions(&partitions)
    }

    fn delete_ts(&self, params: &Params) -> Result<RecordBatch> {
        let series = series(params)?;
        let partition = required(&params.partition, "partition")?;
        let start = required(&params.start_ts, "start_ts")?;
        let end = required(&params.end_ts, "end_ts")?;
        let mut state = self.state.lock();
        let mut removed = 0;
        if let Some(rows) = state.rows.get_mut(&series).and_then(|p| p.get_mut(&partition)) {
            let before = rows.len();
            rows.retain(|ts, _| *ts < start || *ts >= end);
            removed = (before - rows.len()) as u64;
        }
        rows::encode_mutation(Mutation { rows: removed, version: None })
    }

    fn find_latest(&self, params: &Params) -> Result<RecordBatch> {
        let series = series(params)?;
        let state = self.state.lock();
        let found: Vec<DataPoint> = state.latest.get(&series).cloned().into_iter().collect();
        rows::encode_latest(&found)
    }

    fn find_all_latest(&self, params: &Params) -> Result<RecordBatch> {
        let entity = required(&params.entity, "entity")?;
        let state = self.state.lock();
        let mut found: Vec<DataPoint> = state
            .latest
            .iter()
            .filter(|((owner, _), _)| *owner == entity)
            .map(|(_, point)| point.clone())
            .collect();
        found.sort_by(|a, b| a.key.cmp(&b.key));
        rows::encode_latest(&found)
    }

    fn delete_latest(&self, params: &Params) -> Result<RecordBatch> {
        let series = series(params)?;
        let mut state = self.state.lock();
        let removed = state.latest.remove(&series).is_some() as u64;
        state.version += 1;
        let version = state.version;
        rows::encode_mutation(Mutation { rows: removed, version: Some(version) })
    }

    fn delete_expired(&self, params: &Params) -> Result<RecordBatch> {
        let cutoff = required(&params.ts, "ts")?;
        let mut state = self.state.lock();
        let mut removed = 0u64;
        for parts in state.rows.values_mut() {
            for rows in parts.values_mut() {
                let before = rows.len();
                rows.retain(|ts, _| *ts >= cutoff);
                removed += (before - rows.len()) as u64;
            }
            parts.retain(|_, rows| !rows.is_empty());
        }
        state.rows.retain(|_, parts| !parts.is_empty());
        rows::encode_mutation(Mutation { rows: removed, version: None })
    }
}

impl Default for InMemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-type counts plus the extremal value or sum the aggregation asks for
fn aggregate_chunk(batch: &RecordBatch, aggregation: Aggregation) -> Result<AggregationChunk> {
    let longs: &Int64Array = rows::column(batch, DataType::Long.column())?;
    let doubles: &Float64Array = rows::column(batch, DataType::Double.column())?;
    let bools: &BooleanArray = rows::column(batch, DataType::Boolean.column())?;
    let strs: &StringArray = rows::column(batch, DataType::String.column())?;
    let jsons: &StringArray = rows::column(batch, DataType::Json.column())?;
    let ts: &Int64Array = rows::column(batch, schema::TS)?;
    let present = |array: &dyn Array| (array.len() - array.null_count()) as i64;

    let mut chunk = AggregationChunk {
        long_count: present(longs),
        double_count: present(doubles),
        bool_count: present(bools),
        str_count: present(strs),
        json_count: present(jsons),
        max_ts: aggregate::max(ts),
        ..Default::default()
    };
    match aggregation {
        Aggregation::Min => {
            chunk.long_value = aggregate::min(longs);
            chunk.double_value = aggregate::min(doubles);
            chunk.bool_value = aggregate::min_boolean(bools);
            chunk.str_value = aggregate::min_string(strs).map(str::to_string);
            chunk.json_value = aggregate::min_string(jsons).map(str::to_string);
        }
        Aggregation::Max => {
            chunk.long_value = aggregate::max(longs);
            chunk.double_value = aggregate::max(doubles);
            chunk.bool_value = aggregate::max_boolean(bools);
            chunk.str_value = aggregate::max_string(strs).map(str::to_string);
            chunk.json_value = aggregate::max_string(jsons).map(str::to_string);
        }
        Aggregation::Sum | Aggregation::Avg => {
            chunk.long_value = aggregate::sum_checked(longs)?;
            chunk.double_value = aggregate::sum(doubles);
        }
        Aggregation::Count | Aggregation::None => {}
    }
    Ok(chunk)
}

#[async_trait]
impl StorageDriver for InMemoryDriver {
    async fn prepare(&self, key: StatementKey, text: String) -> Result<PreparedStatement> {
        Ok(PreparedStatement { key, text })
    }

    async fn execute(&self, statement: BoundStatement) -> Result<RecordBatch> {
        let operation = statement.operation();
        *self.executions.lock().entry(operation).or_default() += 1;
        {
            let mut failures = self.failures.lock();
            if let Some(pending) = failures.get_mut(&operation).filter(|n| **n > 0) {
                *pending -= 1;
                return Err(Error::backend(format!("injected failure for {operation:?}")));
            }
        }

        let key = &statement.prepared.key;
        let params = &statement.params;
        match operation {
            Operation::InsertTs | Operation::InsertTsTtl => self.insert_ts(key, params),
            Operation::InsertPartition | Operation::InsertPartitionTtl => {
                self.insert_partition(key, params)
            }
            Operation::UpsertLatest => self.upsert_latest(params),
            Operation::FetchTs if key.aggregation == Aggregation::None => {
                self.fetch_rows(key, params)
            }
            Operation::FetchTs => self.fetch_chunk(key, params),
            Operation::FetchPartitions => self.fetch_partitions(params),
            Operation::DeleteTs => self.delete_ts(params),
            Operation::FindLatest => self.find_latest(params),
            Operation::FindAllLatest => self.find_all_latest(params),
            Operation::DeleteLatest => self.delete_latest(params),
            Operation::DeleteExpired => self.delete_expired(params),
        }
    }

    fn supports_ttl(&self) -> bool {
        self.native_ttl
    }
}
