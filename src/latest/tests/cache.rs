use super::*;

#[tokio::test]
async fn test_noop_cache_never_hits() {
    let cache = NoopLatestCache;
    let entity = device();
    cache.put(&entity, versioned("temp", 1, 1.0, 1)).await;
    assert!(cache.get(&entity, "temp").await.is_none());
}

#[tokio::test]
async fn test_moka_cache_keeps_newest_version() {
    let cache = MokaLatestCache::new(16);
    let entity = device();

    cache.put(&entity, versioned("temp", 100, 1.0, 5)).await;
    cache.put(&entity, versioned("temp", 50, 0.5, 3)).await;
    assert_eq!(cache.get(&entity, "temp").await.unwrap().version, Some(5));

    cache.put(&entity, versioned("temp", 200, 2.0, 6)).await;
    let cached = cache.get(&entity, "temp").await.unwrap();
    assert_eq!((cached.ts, cached.version), (200, Some(6)));
}

#[tokio::test]
async fn test_moka_cache_is_keyed_by_entity_and_key() {
    let cache = MokaLatestCache::new(16);
    let (first, second) = (device(), device());
    cache.put(&first, versioned("temp", 1, 1.0, 1)).await;
    cache.put(&first, versioned("humidity", 1, 40.0, 2)).await;

    assert!(cache.get(&second, "temp").await.is_none());
    assert_eq!(cache.get(&first, "humidity").await.unwrap().value, crate::kv::ScalarValue::Float64(40.0));

    cache.evict(&first, "temp").await;
    assert!(cache.get(&first, "temp").await.is_none());
    assert!(cache.get(&first, "humidity").await.is_some());
}
