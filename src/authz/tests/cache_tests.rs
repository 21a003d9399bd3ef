//! Cache store tests

use communitycar_authz::{
    cache::{CacheConfig, CacheStore, InMemoryCacheStore},
    ManualClock,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn store() -> (InMemoryCacheStore, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    (InMemoryCacheStore::with_clock(CacheConfig::default(), clock.clone()), clock)
}

#[tokio::test]
async fn test_per_entry_ttl() {
    let (cache, clock) = store();
    cache.set("short", json!("a"), Duration::from_secs(10)).await.unwrap();
    cache.set("long", json!("b"), Duration::from_secs(300)).await.unwrap();

    clock.advance(Duration::from_secs(11));
    assert!(cache.get("short").await.unwrap().is_none());
    assert_eq!(cache.get("long").await.unwrap(), Some(json!("b")));
}

#[tokio::test]
async fn test_remove_and_clear() {
    let (cache, _) = store();
    cache.set("a", json!(1), Duration::from_secs(60)).await.unwrap();
    cache.set("b", json!(2), Duration::from_secs(60)).await.unwrap();

    cache.remove("a").await.unwrap();
    assert!(cache.get("a").await.unwrap().is_none());
    assert_eq!(cache.len(), 1);

    cache.clear().await.unwrap();
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_expired_entries_evicted_first() {
    let clock = Arc::new(ManualClock::new());
    let cache = InMemoryCacheStore::with_clock(CacheConfig { capacity: 4 }, clock.clone());

    for key in ["a", "b", "c"] {
        cache.set(key, json!(key), Duration::from_secs(5)).await.unwrap();
    }
    cache.set("keep", json!("keep"), Duration::from_secs(600)).await.unwrap();

    clock.advance(Duration::from_secs(6));
    cache.set("new", json!("new"), Duration::from_secs(600)).await.unwrap();

    assert_eq!(cache.len(), 2);
    assert!(cache.get("keep").await.unwrap().is_some());
    assert!(cache.get("new").await.unwrap().is_some());
}

#[tokio::test]
async fn test_hit_rate() {
    let (cache, _) = store();
    cache.set("k", json!(true), Duration::from_secs(60)).await.unwrap();

    cache.get("k").await.unwrap();
    cache.get("k").await.unwrap();
    cache.get("k").await.unwrap();
    cache.get("missing").await.unwrap();

    let stats = cache.stats();
    assert_eq!(stats.hits, 3);
    assert_eq!(stats.misses, 1);
    assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
}
