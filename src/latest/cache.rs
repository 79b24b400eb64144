use async_trait::async_trait;
use moka::future::Cache;
use moka::ops::compute::Op;

use crate::kv::{DataPoint, EntityId};

/// Read-through cache in front of the latest-value table
#[async_trait]
pub trait LatestCache: Send + Sync {
    async fn get(&self, entity: &EntityId, key: &str) -> Option<DataPoint>;

    /// Store `point` unless a newer version is already cached
    async fn put(&self, entity: &EntityId, point: DataPoint);

    async fn evict(&self, entity: &EntityId, key: &str);
}

/// Caches nothing; every lookup goes to storage
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLatestCache;

#[async_trait]
impl LatestCache for NoopLatestCache {
    async fn get(&self, _entity: &EntityId, _key: &str) -> Option<DataPoint> {
        None
    }

    async fn put(&self, _entity: &EntityId, _point: DataPoint) {}

    async fn evict(&self, _entity: &EntityId, _key: &str) {}
}

/// Versioned latest-value cache on a bounded moka cache
#[derive(Clone)]
pub struct MokaLatestCache {
    cache: Cache<(EntityId, String), DataPoint>,
}

impl MokaLatestCache {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            cache: Cache::new(max_capacity),
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl LatestCache for MokaLatestCache {
    async fn get(&self, entity: &EntityId, key: &str) -> Option<DataPoint> {
        self.cache.get(&(*entity, key.to_string())).await
    }

    async fn put(&self, entity: &EntityId, point: DataPoint) {
        let incoming = point.version.unwrap_or(i64::MIN);
        self.cache
            .entry((*entity, point.key.clone()))
            .and_compute_with(|current| {
                let stale = current
                    .and_then(|entry| entry.into_value().version)
                    .is_some_and(|cached| cached > incoming);
                let op = if stale { Op::Nop } else { Op::Put(point) };
                std::future::ready(op)
            })
            .await;
    }

    async fn evict(&self, entity: &EntityId, key: &str) {
        self.cache.invalidate(&(*entity, key.to_string())).await;
    }
}
