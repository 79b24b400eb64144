use super::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use arrow::record_batch::RecordBatch;
use async_trait::async_trait;

use crate::kv::DataType;
use crate::query::{Aggregation, Order};

/// Counts prepare round trips
#[derive(Default)]
struct CountingDriver {
    prepared: AtomicUsize,
}

#[async_trait]
impl StorageDriver for CountingDriver {
    async fn prepare(&self, key: StatementKey, text: String) -> Result<PreparedStatement> {
        self.prepared.fetch_add(1, Ordering::SeqCst);
        Ok(PreparedStatement { key, text })
    }

    async fn execute(&self, _statement: BoundStatement) -> Result<RecordBatch> {
        rows::encode_mutation(rows::Mutation::default())
    }
}

#[tokio::test]
async fn test_statement_prepared_once() {
    let driver = CountingDriver::default();
    let cache = StatementCache::new();
    let key = StatementKey::fetch(Aggregation::None, Order::Desc);

    let first = cache.get(&driver, key).await.unwrap();
    let second = cache.get(&driver, key).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(driver.prepared.load(Ordering::SeqCst), 1);

    cache
        .get(&driver, StatementKey::fetch(Aggregation::None, Order::Asc))
        .await
        .unwrap();
    assert_eq!(driver.prepared.load(Ordering::SeqCst), 2);
    assert_eq!(cache.prepared_count(), 2);
}

#[tokio::test]
async fn test_concurrent_prepare_single_flight() {
    let driver = CountingDriver::default();
    let cache = StatementCache::new();
    let key = StatementKey::typed(Operation::InsertTs, DataType::Double);
    let lookups = (0..16).map(|_| cache.get(&driver, key));
    futures_util::future::try_join_all(lookups).await.unwrap();
    assert_eq!(driver.prepared.load(Ordering::SeqCst), 1);
}

#[test]
fn test_rendered_statements() {
    let insert = StatementKey::typed(Operation::InsertTsTtl, DataType::Long).render();
    assert!(insert.contains("long_v"));
    assert!(insert.ends_with("USING TTL ?"));

    let fetch = StatementKey::fetch(Aggregation::None, Order::Asc).render();
    assert!(fetch.contains("ORDER BY ts ASC LIMIT ?"));

    let avg = StatementKey::fetch(Aggregation::Avg, Order::Asc).render();
    assert!(avg.contains("sum(long_v)"));
    assert!(avg.contains("count(bool_v) AS bool_cnt"));
    assert!(avg.contains("max(ts) AS max_ts"));
    assert!(!avg.contains("sum(str_v)"));

    let max = StatementKey::fetch(Aggregation::Max, Order::Asc).render();
    assert!(max.contains("max(str_v) AS str_v"));
}
