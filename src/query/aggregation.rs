use crate::kv::{DataPoint, ScalarValue};
use crate::storage::{Error, Result};

use super::Aggregation;

/// One pre-aggregated row: per-type counts and the per-type extremal value
/// or sum, depending on the requested aggregation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregationChunk {
    pub long_count: i64,
    pub double_count: i64,
    pub bool_count: i64,
    pub str_count: i64,
    pub json_count: i64,
    pub long_value: Option<i64>,
    pub double_value: Option<f64>,
    pub bool_value: Option<bool>,
    pub str_value: Option<String>,
    pub json_value: Option<String>,
    /// Newest row timestamp the chunk covers
    pub max_ts: Option<i64>,
}

/// Type class a sub-interval result is computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeClass {
    Numeric,
    Boolean,
    String,
    Json,
}

impl AggregationChunk {
    fn is_empty(&self) -> bool {
        [self.long_count, self.double_count, self.bool_count, self.str_count, self.json_count]
            .iter()
            .all(|count| *count == 0)
    }
}

fn missing(column: &str) -> Error {
    Error::Aggregation(format!("chunk counts {column} rows but carries no {column} value"))
}

fn add_count(total: i64, count: i64) -> Result<i64> {
    total
        .checked_add(count)
        .ok_or_else(|| Error::Aggregation("row count overflow".to_string()))
}

fn pick<T>(current: Option<T>, candidate: T, keep_current: impl Fn(&T, &T) -> bool) -> Option<T> {
    match current {
        Some(c) if keep_current(&c, &candidate) => Some(c),
        _ => Some(candidate),
    }
}

/// Running merge of the chunks of one sub-interval. Every type class is
/// accumulated; the class reported is picked when finalizing.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationResult {
    aggregation: Aggregation,
    numeric_count: i64,
    bool_count: i64,
    str_count: i64,
    json_count: i64,
    has_double: bool,
    long_value: Option<i64>,
    double_value: Option<f64>,
    bool_value: Option<bool>,
    str_value: Option<String>,
    json_value: Option<String>,
    max_ts: Option<i64>,
}

impl AggregationResult {
    pub fn new(aggregation: Aggregation) -> Self {
        Self {
            aggregation,
            numeric_count: 0,
            bool_count: 0,
            str_count: 0,
            json_count: 0,
            has_double: false,
            long_value: None,
            double_value: None,
            bool_value: None,
            str_value: None,
            json_value: None,
            max_ts: None,
        }
    }

    /// Rows of every type merged so far
    pub fn count(&self) -> i64 {
        [self.bool_count, self.str_count, self.json_count]
            .into_iter()
            .fold(self.numeric_count, i64::saturating_add)
    }

    /// Newest row timestamp seen in any merged chunk
    pub fn max_ts(&self) -> Option<i64> {
        self.max_ts
    }

    /// Highest-precedence class with rows: numeric, boolean, string, json
    fn class(&self) -> Option<TypeClass> {
        if self.numeric_count > 0 {
            Some(TypeClass::Numeric)
        } else if self.bool_count > 0 {
            Some(TypeClass::Boolean)
        } else if self.str_count > 0 {
            Some(TypeClass::String)
        } else if self.json_count > 0 {
            Some(TypeClass::Json)
        } else {
            None
        }
    }

    /// Fold one chunk in. The result does not depend on merge order.
    pub fn merge(&mut self, chunk: &AggregationChunk) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        self.numeric_count = add_count(self.numeric_count, chunk.long_count)?;
        self.numeric_count = add_count(self.numeric_count, chunk.double_count)?;
        self.bool_count = add_count(self.bool_count, chunk.bool_count)?;
        self.str_count = add_count(self.str_count, chunk.str_count)?;
        self.json_count = add_count(self.json_count, chunk.json_count)?;
        if let Some(ts) = chunk.max_ts {
            self.max_ts = Some(self.max_ts.map_or(ts, |current| current.max(ts)));
        }

        match self.aggregation {
            Aggregation::Count | Aggregation::None => Ok(()),
            Aggregation::Sum | Aggregation::Avg => self.merge_sum(chunk),
            Aggregation::Min => self.merge_extreme(chunk, false),
            Aggregation::Max => self.merge_extreme(chunk, true),
        }
    }

    fn merge_sum(&mut self, chunk: &AggregationChunk) -> Result<()> {
        if chunk.long_count > 0 {
            let value = chunk.long_value.ok_or_else(|| missing("long"))?;
            let sum = self.long_value.unwrap_or(0);
            self.long_value = Some(
                sum.checked_add(value)
                    .ok_or_else(|| Error::Aggregation(format!("long sum overflow adding {value} to {sum}")))?,
            );
        }
        if chunk.double_count > 0 {
            let value = chunk.double_value.ok_or_else(|| missing("double"))?;
            self.has_double = true;
            self.double_value = Some(self.double_value.unwrap_or(0.0) + value);
        }
        Ok(())
    }

    fn merge_extreme(&mut self, chunk: &AggregationChunk, max: bool) -> Result<()> {
        let keep_long = move |c: &i64, n: &i64| if max { c >= n } else { c <= n };
        let keep_double = move |c: &f64, n: &f64| if max { c >= n } else { c <= n };
        let keep_str = move |c: &String, n: &String| if max { c >= n } else { c <= n };
        if chunk.long_count > 0 {
            let value = chunk.long_value.ok_or_else(|| missing("long"))?;
            self.long_value = pick(self.long_value, value, keep_long);
        }
        if chunk.double_count > 0 {
            let value = chunk.double_value.ok_or_else(|| missing("double"))?;
            self.has_double = true;
            self.double_value = pick(self.double_value, value, keep_double);
        }
        if chunk.bool_count > 0 {
            let value = chunk.bool_value.ok_or_else(|| missing("boolean"))?;
            let current = self.bool_value.unwrap_or(value);
            self.bool_value = Some(if max { current || value } else { current && value });
        }
        if chunk.str_count > 0 {
            let value = chunk.str_value.clone().ok_or_else(|| missing("string"))?;
            self.str_value = pick(self.str_value.take(), value, keep_str);
        }
        if chunk.json_count > 0 {
            let value = chunk.json_value.clone().ok_or_else(|| missing("json"))?;
            self.json_value = pick(self.json_value.take(), value, keep_str);
        }
        Ok(())
    }

    fn numeric_extreme(&self, max: bool) -> Option<ScalarValue> {
        if !self.has_double {
            return self.long_value.map(ScalarValue::Int64);
        }
        let long = self.long_value.map(|v| v as f64);
        let value = match (long, self.double_value) {
            (Some(l), Some(d)) => Some(if max { l.max(d) } else { l.min(d) }),
            (l, d) => l.or(d),
        };
        value.map(ScalarValue::Float64)
    }

    /// Final point for the sub-interval, stamped at `ts`. `None` when no row
    /// contributed or the aggregation is undefined for the type class.
    pub fn finalize(&self, key: &str, ts: i64) -> Option<DataPoint> {
        let class = self.class()?;
        let value = match (self.aggregation, class) {
            (Aggregation::Count, _) => Some(ScalarValue::Int64(self.count())),
            (Aggregation::Sum, TypeClass::Numeric) => Some(self.sum_value()),
            (Aggregation::Avg, TypeClass::Numeric) => Some(self.avg_value()),
            (Aggregation::Sum | Aggregation::Avg, _) => None,
            (Aggregation::Min, TypeClass::Numeric) => self.numeric_extreme(false),
            (Aggregation::Max, TypeClass::Numeric) => self.numeric_extreme(true),
            (Aggregation::Min | Aggregation::Max, TypeClass::Boolean) => {
                self.bool_value.map(ScalarValue::Boolean)
            }
            (Aggregation::Min | Aggregation::Max, TypeClass::String) => {
                self.str_value.clone().map(ScalarValue::Utf8)
            }
            (Aggregation::Min | Aggregation::Max, TypeClass::Json) => {
                self.json_value.clone().map(ScalarValue::Json)
            }
            (Aggregation::None, _) => None,
        }?;
        Some(DataPoint::new(key, ts, value))
    }

    fn sum_value(&self) -> ScalarValue {
        let long = self.long_value.unwrap_or(0);
        if self.has_double {
            ScalarValue::Float64(long as f64 + self.double_value.unwrap_or(0.0))
        } else {
            ScalarValue::Int64(long)
        }
    }

    fn avg_value(&self) -> ScalarValue {
        let long = self.long_value.unwrap_or(0);
        if self.has_double {
            ScalarValue::Float64((long as f64 + self.double_value.unwrap_or(0.0)) / self.numeric_count as f64)
        } else {
            ScalarValue::Int64(long / self.numeric_count)
        }
    }
}
