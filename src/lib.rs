//! Storage core for partitioned key-value telemetry.
//!
//! Raw points are grouped into time buckets per entity and key, range reads
//! walk those buckets through a cursor, aggregated reads merge per-bucket
//! chunks per sub-interval, and a versioned latest value is kept per key.

pub mod kv;
pub mod latest;
pub mod query;
pub mod storage;
pub mod timeseries;

pub use kv::{DataPoint, DataType, EntityId, EntityType, LatestEntry, ScalarValue, TenantId};
pub use query::{Aggregation, DeleteQuery, Order, ReadQuery, ReadResult};
pub use storage::{Error, InMemoryDriver, PartitionGranularity, Result, StorageConfig, StorageDriver};
pub use timeseries::TimeseriesDao;
