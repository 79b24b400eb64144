//! Arrow layouts of the row batches exchanged with a driver

use std::sync::{Arc, LazyLock};

use arrow::datatypes::{DataType as ArrowType, Field, Schema, SchemaRef};

use crate::kv::DataType;

pub const KEY: &str = "key";
pub const TS: &str = "ts";
pub const VERSION: &str = "version";
pub const PARTITION: &str = "partition";
pub const ROWS: &str = "rows";
pub const MAX_TS: &str = "max_ts";

pub fn arrow_type(data_type: DataType) -> ArrowType {
    match data_type {
        DataType::Boolean => ArrowType::Boolean,
        DataType::String | DataType::Json => ArrowType::Utf8,
        DataType::Long => ArrowType::Int64,
        DataType::Double => ArrowType::Float64,
    }
}

fn value_fields() -> impl Iterator<Item = Field> {
    DataType::ALL
        .into_iter()
        .map(|t| Field::new(t.column(), arrow_type(t), true))
}

static TS_KV: LazyLock<SchemaRef> = LazyLock::new(|| {
    let mut fields = vec![
        Field::new(KEY, ArrowType::Utf8, false),
        Field::new(TS, ArrowType::Int64, false),
    ];
    fields.extend(value_fields());
    Arc::new(Schema::new(fields))
});

static LATEST: LazyLock<SchemaRef> = LazyLock::new(|| {
    let mut fields: Vec<Field> = TS_KV.fields().iter().map(|f| f.as_ref().clone()).collect();
    fields.push(Field::new(VERSION, ArrowType::Int64, true));
    Arc::new(Schema::new(fields))
});

static PARTITIONS: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![Field::new(PARTITION, ArrowType::Int64, false)]))
});

static CHUNK: LazyLock<SchemaRef> = LazyLock::new(|| {
    let mut fields: Vec<Field> = DataType::ALL
        .into_iter()
        .map(|t| Field::new(t.count_column(), ArrowType::Int64, false))
        .collect();
    fields.extend(value_fields());
    fields.push(Field::new(MAX_TS, ArrowType::Int64, true));
    Arc::new(Schema::new(fields))
});

static MUTATION: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        Field::new(ROWS, ArrowType::Int64, false),
        Field::new(VERSION, ArrowType::Int64, true),
    ]))
});

/// Raw history rows: key, ts and one populated value column
pub fn ts_kv() -> SchemaRef {
    TS_KV.clone()
}

/// Raw columns plus the write version
pub fn latest() -> SchemaRef {
    LATEST.clone()
}

pub fn partitions() -> SchemaRef {
    PARTITIONS.clone()
}

/// One pre-aggregated row per partition: per-type counts, the
/// extremal value or sum of each type and the newest timestamp
pub fn chunk() -> SchemaRef {
    CHUNK.clone()
}

/// Affected row count and, for latest writes, the assigned version
pub fn mutation() -> SchemaRef {
    MUTATION.clone()
}
