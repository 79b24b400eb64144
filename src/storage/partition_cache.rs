use moka::sync::Cache;

use crate::kv::EntityId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PartitionMarker {
    entity: EntityId,
    key: String,
    partition: i64,
}

/// Bounded memory of partition markers already written.
///
/// Only skips redundant marker writes: a miss triggers a write and an
/// evicted entry costs one duplicate upsert, never a lost marker.
#[derive(Clone)]
pub struct PartitionCache {
    cache: Option<Cache<PartitionMarker, ()>>,
}

impl PartitionCache {
    /// A capacity of 0 disables caching so every save writes its marker
    pub fn new(max_capacity: u64) -> Self {
        let cache = (max_capacity > 0).then(|| Cache::new(max_capacity));
        Self { cache }
    }

    pub fn has(&self, entity: &EntityId, key: &str, partition: i64) -> bool {
        let Some(cache) = &self.cache else {
            return false;
        };
        cache.contains_key(&PartitionMarker {
            entity: *entity,
            key: key.to_string(),
            partition,
        })
    }

    /// Record a marker. Call only after the marker write succeeded.
    pub fn remember(&self, entity: &EntityId, key: &str, partition: i64) {
        if let Some(cache) = &self.cache {
            cache.insert(
                PartitionMarker {
                    entity: *entity,
                    key: key.to_string(),
                    partition,
                },
                (),
            );
        }
    }
}
