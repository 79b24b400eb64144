use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::OnceCell;

use super::{Result, StorageDriver};
use crate::kv::{DataType, EntityId, ScalarValue};
use crate::query::{Aggregation, Order};

pub const TS_KV_TABLE: &str = "ts_kv";
pub const PARTITIONS_TABLE: &str = "ts_kv_partitions";
pub const LATEST_TABLE: &str = "ts_kv_latest";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    InsertTs,
    InsertTsTtl,
    InsertPartition,
    InsertPartitionTtl,
    UpsertLatest,
    FetchTs,
    FetchPartitions,
    DeleteTs,
    FindLatest,
    FindAllLatest,
    DeleteLatest,
    DeleteExpired,
}

/// Identity of a prepared statement template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatementKey {
    pub operation: Operation,
    pub data_type: Option<DataType>,
    pub aggregation: Aggregation,
    pub order: Order,
}

impl StatementKey {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            data_type: None,
            aggregation: Aggregation::None,
            order: Order::Desc,
        }
    }

    pub fn typed(operation: Operation, data_type: DataType) -> Self {
        Self {
            data_type: Some(data_type),
            ..Self::new(operation)
        }
    }

    pub fn fetch(aggregation: Aggregation, order: Order) -> Self {
        Self {
            aggregation,
            order,
            ..Self::new(Operation::FetchTs)
        }
    }

    fn value_column(&self) -> &'static str {
        self.data_type.map(|t| t.column()).unwrap_or("str_v")
    }

    fn chunk_columns(&self) -> String {
        let counts = DataType::ALL
            .iter()
            .map(|t| format!("count({}) AS {}", t.column(), t.count_column()));
        let function = match self.aggregation {
            Aggregation::Min => Some("min"),
            Aggregation::Max => Some("max"),
            Aggregation::Sum | Aggregation::Avg => Some("sum"),
            Aggregation::Count | Aggregation::None => None,
        };
        let values = DataType::ALL.iter().filter_map(|t| {
            let numeric = matches!(t, DataType::Long | DataType::Double);
            match function {
                Some("sum") if !numeric => None,
                Some(f) => Some(format!("{f}({0}) AS {0}", t.column())),
                None => None,
            }
        });
        counts
            .chain(values)
            .chain(std::iter::once("max(ts) AS max_ts".to_string()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Statement text handed to the driver at prepare time
    pub fn render(&self) -> String {
        let order = match self.order {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        };
        match self.operation {
            Operation::InsertTs => format!(
                "INSERT INTO {TS_KV_TABLE} (entity_type, entity_id, key, partition, ts, {}) VALUES (?, ?, ?, ?, ?, ?)",
                self.value_column()
            ),
            Operation::InsertTsTtl => format!(
                "INSERT INTO {TS_KV_TABLE} (entity_type, entity_id, key, partition, ts, {}) VALUES (?, ?, ?, ?, ?, ?) USING TTL ?",
                self.value_column()
            ),
            Operation::InsertPartition => format!(
                "INSERT INTO {PARTITIONS_TABLE} (entity_type, entity_id, key, partition) VALUES (?, ?, ?, ?)"
            ),
            Operation::InsertPartitionTtl => format!(
                "INSERT INTO {PARTITIONS_TABLE} (entity_type, entity_id, key, partition) VALUES (?, ?, ?, ?) USING TTL ?"
            ),
            Operation::UpsertLatest => format!(
                "INSERT INTO {LATEST_TABLE} (entity_type, entity_id, key, ts, {}, version) VALUES (?, ?, ?, ?, ?, next_version())",
                self.value_column()
            ),
            Operation::FetchTs if self.aggregation == Aggregation::None => format!(
                "SELECT key, ts, bool_v, str_v, long_v, dbl_v, json_v FROM {TS_KV_TABLE} WHERE entity_type = ? AND entity_id = ? AND key = ? AND partition = ? AND ts >= ? AND ts < ? ORDER BY ts {order} LIMIT ?"
            ),
            Operation::FetchTs => format!(
                "SELECT {} FROM {TS_KV_TABLE} WHERE entity_type = ? AND entity_id = ? AND key = ? AND partition = ? AND ts >= ? AND ts < ?",
                self.chunk_columns()
            ),
            Operation::FetchPartitions => format!(
                "SELECT partition FROM {PARTITIONS_TABLE} WHERE entity_type = ? AND entity_id = ? AND key = ? AND partition >= ? AND partition <= ?"
            ),
            Operation::DeleteTs => format!(
                "DELETE FROM {TS_KV_TABLE} WHERE entity_type = ? AND entity_id = ? AND key = ? AND partition = ? AND ts >= ? AND ts < ?"
            ),
            Operation::FindLatest => format!(
                "SELECT key, ts, bool_v, str_v, long_v, dbl_v, json_v, version FROM {LATEST_TABLE} WHERE entity_type = ? AND entity_id = ? AND key = ?"
            ),
            Operation::FindAllLatest => format!(
                "SELECT key, ts, bool_v, str_v, long_v, dbl_v, json_v, version FROM {LATEST_TABLE} WHERE entity_type = ? AND entity_id = ?"
            ),
            Operation::DeleteLatest => format!(
                "DELETE FROM {LATEST_TABLE} WHERE entity_type = ? AND entity_id = ? AND key = ?"
            ),
            Operation::DeleteExpired => format!("DELETE FROM {TS_KV_TABLE} WHERE ts < ?"),
        }
    }
}

#[derive(Debug)]
pub struct PreparedStatement {
    pub key: StatementKey,
    pub text: String,
}

/// Values bound to a prepared statement; unused slots stay `None`
#[derive(Debug, Clone, Default)]
pub struct Params {
    pub entity: Option<EntityId>,
    pub key: Option<String>,
    pub partition: Option<i64>,
    pub ts: Option<i64>,
    pub start_ts: Option<i64>,
    pub end_ts: Option<i64>,
    /// Inclusive partition bounds for marker lookups
    pub min_partition: Option<i64>,
    pub max_partition: Option<i64>,
    pub limit: Option<usize>,
    pub value: Option<ScalarValue>,
    pub ttl_secs: Option<i64>,
}

impl Params {
    pub fn series(entity: &EntityId, key: &str) -> Self {
        Self {
            entity: Some(*entity),
            key: Some(key.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct BoundStatement {
    pub prepared: Arc<PreparedStatement>,
    pub params: Params,
}

impl BoundStatement {
    pub fn operation(&self) -> Operation {
        self.prepared.key.operation
    }
}

/// Lazily prepared statement templates, one per key.
///
/// The registry lock only guards finding the slot; preparing happens
/// outside it and at most once per key.
pub struct StatementCache {
    slots: RwLock<HashMap<StatementKey, Arc<OnceCell<Arc<PreparedStatement>>>>>,
}

impl StatementCache {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }

    fn slot(&self, key: StatementKey) -> Arc<OnceCell<Arc<PreparedStatement>>> {
        if let Some(slot) = self.slots.read().get(&key) {
            return slot.clone();
        }
        self.slots.write().entry(key).or_default().clone()
    }

    pub async fn get(
        &self,
        driver: &dyn StorageDriver,
        key: StatementKey,
    ) -> Result<Arc<PreparedStatement>> {
        let slot = self.slot(key);
        let prepared = slot
            .get_or_try_init(|| async {
                let text = key.render();
                log::debug!("Preparing {:?}: {}", key.operation, text);
                driver.prepare(key, text).await.map(Arc::new)
            })
            .await?;
        Ok(prepared.clone())
    }

    pub async fn bind(
        &self,
        driver: &dyn StorageDriver,
        key: StatementKey,
        params: Params,
    ) -> Result<BoundStatement> {
        Ok(BoundStatement {
            prepared: self.get(driver, key).await?,
            params,
        })
    }

    pub fn prepared_count(&self) -> usize {
        self.slots
            .read()
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }
}

impl Default for StatementCache {
    fn default() -> Self {
        Self::new()
    }
}
