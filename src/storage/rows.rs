//! Conversion between driver row batches and telemetry points

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

use super::{Error, Result, schema};
use crate::kv::{DataPoint, DataType, ScalarValue};
use crate::query::AggregationChunk;

pub(crate) fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::SchemaMismatch(format!("missing column '{name}'")))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| Error::SchemaMismatch(format!("column '{name}' has an unexpected type")))
}

fn optional_column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<Option<&'a T>> {
    if batch.schema().column_with_name(name).is_none() {
        return Ok(None);
    }
    column(batch, name).map(Some)
}

/// Typed views over the five value columns of a batch
struct ValueColumns<'a> {
    bool_v: &'a BooleanArray,
    str_v: &'a StringArray,
    long_v: &'a Int64Array,
    dbl_v: &'a Float64Array,
    json_v: &'a StringArray,
}

impl<'a> ValueColumns<'a> {
    fn new(batch: &'a RecordBatch) -> Result<Self> {
        Ok(Self {
            bool_v: column(batch, DataType::Boolean.column())?,
            str_v: column(batch, DataType::String.column())?,
            long_v: column(batch, DataType::Long.column())?,
            dbl_v: column(batch, DataType::Double.column())?,
            json_v: column(batch, DataType::Json.column())?,
        })
    }

    /// First populated column wins: string, long, double, boolean, json
    fn value(&self, row: usize) -> Option<ScalarValue> {
        if self.str_v.is_valid(row) {
            Some(ScalarValue::Utf8(self.str_v.value(row).to_string()))
        } else if self.long_v.is_valid(row) {
            Some(ScalarValue::Int64(self.long_v.value(row)))
        } else if self.dbl_v.is_valid(row) {
            Some(ScalarValue::Float64(self.dbl_v.value(row)))
        } else if self.bool_v.is_valid(row) {
            Some(ScalarValue::Boolean(self.bool_v.value(row)))
        } else if self.json_v.is_valid(row) {
            Some(ScalarValue::Json(self.json_v.value(row).to_string()))
        } else {
            None
        }
    }
}

/// Decode raw or latest rows. Rows without any value are skipped.
pub fn decode_points(batch: &RecordBatch) -> Result<Vec<DataPoint>> {
    let keys: &StringArray = column(batch, schema::KEY)?;
    let ts: &Int64Array = column(batch, schema::TS)?;
    let versions: Option<&Int64Array> = optional_column(batch, schema::VERSION)?;
    let values = ValueColumns::new(batch)?;

    let mut points = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let Some(value) = values.value(row) else {
            log::warn!("Row {row} of key '{}' has no value, skipping", keys.value(row));
            continue;
        };
        points.push(DataPoint {
            key: keys.value(row).to_string(),
            ts: ts.value(row),
            value,
            version: versions.filter(|v| v.is_valid(row)).map(|v| v.value(row)),
        });
    }
    Ok(points)
}

pub fn decode_partitions(batch: &RecordBatch) -> Result<Vec<i64>> {
    let partitions: &Int64Array = column(batch, schema::PARTITION)?;
    Ok(partitions.iter().flatten().collect())
}

pub fn decode_chunks(batch: &RecordBatch) -> Result<Vec<AggregationChunk>> {
    let count = |t: DataType| column::<Int64Array>(batch, t.count_column());
    let (long_cnt, dbl_cnt, bool_cnt, str_cnt, json_cnt) = (
        count(DataType::Long)?,
        count(DataType::Double)?,
        count(DataType::Boolean)?,
        count(DataType::String)?,
        count(DataType::Json)?,
    );
    let max_ts: &Int64Array = column(batch, schema::MAX_TS)?;
    let values = ValueColumns::new(batch)?;

    let opt_str = |arr: &StringArray, row| arr.is_valid(row).then(|| arr.value(row).to_string());
    Ok((0..batch.num_rows())
        .map(|row| AggregationChunk {
            long_count: long_cnt.value(row),
            double_count: dbl_cnt.value(row),
            bool_count: bool_cnt.value(row),
            str_count: str_cnt.value(row),
            json_count: json_cnt.value(row),
            long_value: values.long_v.is_valid(row).then(|| values.long_v.value(row)),
            double_value: values.dbl_v.is_valid(row).then(|| values.dbl_v.value(row)),
            bool_value: values.bool_v.is_valid(row).then(|| values.bool_v.value(row)),
            str_value: opt_str(values.str_v, row),
            json_value: opt_str(values.json_v, row),
            max_ts: max_ts.is_valid(row).then(|| max_ts.value(row)),
        })
        .collect())
}

/// Affected rows and the version assigned by a latest write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mutation {
    pub rows: u64,
    pub version: Option<i64>,
}

pub fn decode_mutation(batch: &RecordBatch) -> Result<Mutation> {
    let rows: &Int64Array = column(batch, schema::ROWS)?;
    let versions: &Int64Array = column(batch, schema::VERSION)?;
    let mut mutation = Mutation::default();
    for row in 0..batch.num_rows() {
        mutation.rows += rows.value(row).max(0) as u64;
        if versions.is_valid(row) {
            mutation.version = Some(versions.value(row));
        }
    }
    Ok(mutation)
}

fn value_arrays<'a>(values: impl Iterator<Item = &'a ScalarValue> + Clone) -> Vec<ArrayRef> {
    let pick = |t: DataType| values.clone().map(move |v| (v.data_type() == t).then_some(v));
    let bool_v: BooleanArray = pick(DataType::Boolean)
        .map(|v| match v {
            Some(ScalarValue::Boolean(b)) => Some(*b),
            _ => None,
        })
        .collect();
    let text = |t: DataType| -> StringArray {
        pick(t)
            .map(|v| match v {
                Some(ScalarValue::Utf8(s) | ScalarValue::Json(s)) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    };
    let long_v: Int64Array = pick(DataType::Long)
        .map(|v| match v {
            Some(ScalarValue::Int64(i)) => Some(*i),
            _ => None,
        })
        .collect();
    let dbl_v: Float64Array = pick(DataType::Double)
        .map(|v| match v {
            Some(ScalarValue::Float64(f)) => Some(*f),
            _ => None,
        })
        .collect();
    vec![
        Arc::new(bool_v),
        Arc::new(text(DataType::String)),
        Arc::new(long_v),
        Arc::new(dbl_v),
        Arc::new(text(DataType::Json)),
    ]
}

fn encode(schema: SchemaRef, points: &[DataPoint], with_version: bool) -> Result<RecordBatch> {
    let keys: StringArray = points.iter().map(|p| Some(p.key.as_str())).collect();
    let ts = Int64Array::from_iter_values(points.iter().map(|p| p.ts));
    let mut columns: Vec<ArrayRef> = vec![Arc::new(keys), Arc::new(ts)];
    columns.extend(value_arrays(points.iter().map(|p| &p.value)));
    if with_version {
        columns.push(Arc::new(points.iter().map(|p| p.version).collect::<Int64Array>()));
    }
    Ok(RecordBatch::try_new(schema, columns)?)
}

/// Raw history rows in the `ts_kv` layout
pub fn encode_points(points: &[DataPoint]) -> Result<RecordBatch> {
    encode(schema::ts_kv(), points, false)
}

/// Latest rows, carrying their versions
pub fn encode_latest(points: &[DataPoint]) -> Result<RecordBatch> {
    encode(schema::latest(), points, true)
}

pub fn encode_partitions(partitions: &[i64]) -> Result<RecordBatch> {
    let column = Int64Array::from_iter_values(partitions.iter().copied());
    Ok(RecordBatch::try_new(schema::partitions(), vec![Arc::new(column)])?)
}

pub fn encode_mutation(mutation: Mutation) -> Result<RecordBatch> {
    Ok(RecordBatch::try_new(
        schema::mutation(),
        vec![
            Arc::new(Int64Array::from(vec![mutation.rows as i64])),
            Arc::new(Int64Array::from(vec![mutation.version])),
        ],
    )?)
}

pub fn encode_chunk(chunk: &AggregationChunk) -> Result<RecordBatch> {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(vec![chunk.bool_count])),
        Arc::new(Int64Array::from(vec![chunk.str_count])),
        Arc::new(Int64Array::from(vec![chunk.long_count])),
        Arc::new(Int64Array::from(vec![chunk.double_count])),
        Arc::new(Int64Array::from(vec![chunk.json_count])),
        Arc::new(BooleanArray::from(vec![chunk.bool_value])),
        Arc::new(StringArray::from(vec![chunk.str_value.clone()])),
        Arc::new(Int64Array::from(vec![chunk.long_value])),
        Arc::new(Float64Array::from(vec![chunk.double_value])),
        Arc::new(StringArray::from(vec![chunk.json_value.clone()])),
        Arc::new(Int64Array::from(vec![chunk.max_ts])),
    ];
    Ok(RecordBatch::try_new(schema::chunk(), columns)?)
}
