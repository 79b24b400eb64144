//! Partitioned storage plumbing: buckets, statements, row batches and drivers

use std::str::FromStr;

use serde::Deserialize;

mod driver;
mod memory;
mod partition;
mod partition_cache;
mod pool;
pub mod rows;
pub mod schema;
mod statement;

#[cfg(test)]
mod tests;

pub use driver::StorageDriver;
pub use memory::InMemoryDriver;
pub use partition::INDEFINITE_PARTITION;
pub use partition_cache::PartitionCache;
pub use pool::DecodePool;
pub use statement::{BoundStatement, Operation, Params, PreparedStatement, StatementCache, StatementKey};

pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for storage operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("Invalid Partition: {0}")]
    InvalidPartition(String),
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("Aggregation failed: {0}")]
    Aggregation(String),
    #[error("Storage backend error: {message}")]
    Backend {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Worker pool error: {0}")]
    Worker(String),
    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn backend(message: impl Into<String>) -> Self {
        Error::Backend {
            message: message.into(),
            source: None,
        }
    }

    pub fn backend_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::Backend {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Width of the time bucket raw rows are grouped by
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum PartitionGranularity {
    Minute,
    Hour,
    Day,
    Month,
    Year,
    /// Single constant bucket for the whole history of a key
    Indefinite,
}

impl FromStr for PartitionGranularity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MINUTES" | "MINUTE" => Ok(PartitionGranularity::Minute),
            "HOURS" | "HOUR" => Ok(PartitionGranularity::Hour),
            "DAYS" | "DAY" => Ok(PartitionGranularity::Day),
            "MONTHS" | "MONTH" => Ok(PartitionGranularity::Month),
            "YEARS" | "YEAR" => Ok(PartitionGranularity::Year),
            "INDEFINITE" => Ok(PartitionGranularity::Indefinite),
            other => Err(Error::Config(format!(
                "unsupported partitioning '{other}', expected one of MINUTES, HOURS, DAYS, MONTHS, YEARS, INDEFINITE"
            ))),
        }
    }
}

impl TryFrom<String> for PartitionGranularity {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Configuration for the storage core
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub partition_granularity: PartitionGranularity,
    /// System retention in seconds, 0 keeps data forever
    pub system_ttl_secs: i64,
    /// Above this many buckets the partition list is read from markers
    pub max_enumerated_partitions: u64,
    pub max_aggregation_intervals: u64,
    pub min_aggregation_step_ms: i64,
    /// 0 disables the partition existence cache
    pub partitions_cache_size: u64,
    /// 0 disables latest value caching
    pub latest_cache_size: u64,
    pub save_ts: bool,
    pub save_latest: bool,
    pub decode_threads: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            partition_granularity: PartitionGranularity::Month,
            system_ttl_secs: 0,
            max_enumerated_partitions: 100,
            max_aggregation_intervals: 700,
            min_aggregation_step_ms: 1000,
            partitions_cache_size: 100_000,
            latest_cache_size: 0,
            save_ts: true,
            save_latest: true,
            decode_threads: 4,
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<()> {
        if self.system_ttl_secs < 0 {
            return Err(Error::Config(format!(
                "system ttl must not be negative, got {}",
                self.system_ttl_secs
            )));
        }
        if self.min_aggregation_step_ms <= 0 {
            return Err(Error::Config(
                "min aggregation step must be positive".to_string(),
            ));
        }
        if self.decode_threads == 0 {
            return Err(Error::Config(
                "decode pool needs at least one thread".to_string(),
            ));
        }
        if !self.save_ts && !self.save_latest {
            log::warn!("Both raw and latest writes are disabled, saves will be no-ops");
        }
        Ok(())
    }
}
