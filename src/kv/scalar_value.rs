use std::fmt;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use serde::{Deserialize, Serialize};

use super::DataType;

/// A single telemetry value. Exactly one variant is populated per point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum ScalarValue {
    Boolean(bool),
    Utf8(String),
    Int64(i64),
    Float64(f64),
    /// Serialized JSON document, kept as text
    Json(String),
}

/// Characters of string/json payload billed as one data point
pub const MAX_CHARS_PER_DATA_POINT: usize = 512;

impl ScalarValue {
    pub fn data_type(&self) -> DataType {
        match self {
            ScalarValue::Boolean(_) => DataType::Boolean,
            ScalarValue::Utf8(_) => DataType::String,
            ScalarValue::Int64(_) => DataType::Long,
            ScalarValue::Float64(_) => DataType::Double,
            ScalarValue::Json(_) => DataType::Json,
        }
    }

    /// Parses and re-serializes a JSON document so only valid JSON is stored
    pub fn json(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        Ok(ScalarValue::Json(serde_json::to_string(value)?))
    }

    /// Number of billable data points this value represents
    pub fn data_points(&self) -> u64 {
        let len = match self {
            ScalarValue::Utf8(s) | ScalarValue::Json(s) => s.chars().count(),
            _ => return 1,
        };
        len.div_ceil(MAX_CHARS_PER_DATA_POINT).max(1) as u64
    }

    /// Repeat the scalar into an Arrow array of `len` elements
    pub fn to_array(&self, len: usize) -> ArrayRef {
        match self {
            ScalarValue::Boolean(b) => Arc::new(BooleanArray::from(vec![*b; len])) as ArrayRef,
            ScalarValue::Utf8(s) | ScalarValue::Json(s) => {
                Arc::new(StringArray::from(vec![s.as_str(); len])) as ArrayRef
            }
            ScalarValue::Int64(i) => Arc::new(Int64Array::from(vec![*i; len])) as ArrayRef,
            ScalarValue::Float64(f) => Arc::new(Float64Array::from(vec![*f; len])) as ArrayRef,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Boolean(v) => write!(f, "{v}"),
            ScalarValue::Utf8(v) | ScalarValue::Json(v) => f.write_str(v),
            ScalarValue::Int64(v) => write!(f, "{v}"),
            ScalarValue::Float64(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for ScalarValue {
    fn from(v: bool) -> Self {
        ScalarValue::Boolean(v)
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        ScalarValue::Int64(v)
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        ScalarValue::Float64(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        ScalarValue::Utf8(v.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        ScalarValue::Utf8(v)
    }
}
