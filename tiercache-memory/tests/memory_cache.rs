use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tiercache_backend::{
    Cache, GetOptions, IncrOptions, SetOptions, TTL_MISSING, TTL_NO_EXPIRY,
};
use tiercache_core::{HealthStatus, ManualClock};
use tiercache_memory::{MemoryCache, MemoryCacheBuilder};

fn cache_at(clock: &Arc<ManualClock>) -> MemoryCacheBuilder {
    let clock: Arc<dyn tiercache_core::Clock> = clock.clone();
    MemoryCache::builder().check_interval(0).clock(clock)
}

#[tokio::test]
async fn test_set_get_roundtrip() {
    let clock = Arc::new(ManualClock::new(1_000));
    let cache = cache_at(&clock).build();

    assert!(cache.set("user:42", &json!({"name": "ada"}), &SetOptions::default()).await);
    let value = cache.get("user:42", &GetOptions::default()).await;
    assert_eq!(value, Some(json!({"name": "ada"})));

    assert_eq!(cache.get("user:43", &GetOptions::default()).await, None);
}

#[tokio::test]
async fn test_miss_returns_fallback() {
    let clock = Arc::new(ManualClock::new(1_000));
    let cache = cache_at(&clock).build();

    let opts = GetOptions::default().with_fallback(json!([]));
    assert_eq!(cache.get("absent", &opts).await, Some(json!([])));
}

#[tokio::test]
async fn test_entry_expires_after_ttl() {
    let clock = Arc::new(ManualClock::new(1_000));
    let cache = cache_at(&clock).build();

    cache.set("k", &json!(1), &SetOptions::default().with_ttl(10)).await;
    assert!(cache.exists("k", None).await);

    clock.advance(9_999);
    assert!(cache.exists("k", None).await);

    clock.advance(1);
    assert!(!cache.exists("k", None).await);
    assert_eq!(cache.get("k", &GetOptions::default()).await, None);
    assert_eq!(cache.stats().ttl_expired, 1);
}

#[tokio::test]
async fn test_ttl_sentinels() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache_at(&clock).build();

    assert_eq!(cache.ttl("absent", None).await, TTL_MISSING);

    // Explicit zero means the entry never expires.
    cache.set("forever", &json!(true), &SetOptions::default().with_ttl(0)).await;
    assert_eq!(cache.ttl("forever", None).await, TTL_NO_EXPIRY);

    cache.set("short", &json!(true), &SetOptions::default().with_ttl(30)).await;
    assert_eq!(cache.ttl("short", None).await, 30);
    clock.advance(10_500);
    assert_eq!(cache.ttl("short", None).await, 19);

    clock.advance(30_000);
    assert_eq!(cache.ttl("short", None).await, TTL_MISSING);
}

#[tokio::test]
async fn test_kind_ttl_precedence() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache_at(&clock)
        .default_ttl(100)
        .kind_ttl("volatile", 5)
        .build();

    // No TTL and no kind falls back to the cache-wide default.
    cache.set("plain", &json!(1), &SetOptions::default()).await;
    assert_eq!(cache.ttl("plain", None).await, 100);

    // The kind's default wins over the cache-wide one.
    let volatile = SetOptions::default().with_kind("volatile");
    cache.set("v", &json!(1), &volatile).await;
    assert_eq!(cache.ttl("v", None).await, 5);

    // An explicit TTL wins over both.
    let explicit = SetOptions::default().with_kind("volatile").with_ttl(60);
    cache.set("e", &json!(1), &explicit).await;
    assert_eq!(cache.ttl("e", None).await, 60);
}

#[tokio::test]
async fn test_expire_updates_and_clears() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache_at(&clock).build();

    cache.set("k", &json!(1), &SetOptions::default().with_ttl(5)).await;
    assert!(cache.expire("k", 120, None).await);
    assert_eq!(cache.ttl("k", None).await, 120);

    // Zero seconds removes the expiry entirely.
    assert!(cache.expire("k", 0, None).await);
    assert_eq!(cache.ttl("k", None).await, TTL_NO_EXPIRY);

    assert!(!cache.expire("absent", 120, None).await);
}

#[tokio::test]
async fn test_set_nx_respects_live_entries_only() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache_at(&clock).build();
    let nx = SetOptions::default().with_nx().with_ttl(10);

    assert!(cache.set("lock", &json!("a"), &nx).await);
    assert!(!cache.set("lock", &json!("b"), &nx).await);
    assert_eq!(cache.get("lock", &GetOptions::default()).await, Some(json!("a")));

    // An expired holder no longer blocks the write.
    clock.advance(10_001);
    assert!(cache.set("lock", &json!("b"), &nx).await);
    assert_eq!(cache.get("lock", &GetOptions::default()).await, Some(json!("b")));
}

#[tokio::test]
async fn test_incr_semantics() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache_at(&clock).build();

    assert_eq!(cache.incr("hits", &IncrOptions::default()).await, Some(1));
    assert_eq!(cache.incr("hits", &IncrOptions::default()).await, Some(2));
    let by_ten = IncrOptions::default().with_amount(10);
    assert_eq!(cache.incr("hits", &by_ten).await, Some(12));
    let down = IncrOptions::default().with_amount(-2);
    assert_eq!(cache.incr("hits", &down).await, Some(10));
}

#[tokio::test]
async fn test_incr_resets_non_numeric_value() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache_at(&clock).build();

    cache.set("counter", &json!("oops"), &SetOptions::default()).await;
    assert_eq!(cache.incr("counter", &IncrOptions::default()).await, Some(1));
}

#[tokio::test]
async fn test_incr_ttl_applies_only_on_creation() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache_at(&clock).build();
    let opts = IncrOptions::default().with_ttl(10);

    assert_eq!(cache.incr("rate", &opts).await, Some(1));
    assert_eq!(cache.ttl("rate", None).await, 10);

    // A later increment does not refresh the window.
    clock.advance(4_000);
    assert_eq!(cache.incr("rate", &opts).await, Some(2));
    assert_eq!(cache.ttl("rate", None).await, 6);

    // After expiry the counter restarts from scratch with a fresh TTL.
    clock.advance(7_000);
    assert_eq!(cache.incr("rate", &opts).await, Some(1));
    assert_eq!(cache.ttl("rate", None).await, 10);
}

#[tokio::test]
async fn test_lru_eviction_prefers_stale_entries() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache_at(&clock).max_size(3).build();

    cache.set("a", &json!(1), &SetOptions::default()).await;
    cache.set("b", &json!(2), &SetOptions::default()).await;
    cache.set("c", &json!(3), &SetOptions::default()).await;

    // Reading "a" makes "b" the least recently used entry.
    cache.get("a", &GetOptions::default()).await;
    cache.set("d", &json!(4), &SetOptions::default()).await;

    assert!(cache.exists("a", None).await);
    assert!(!cache.exists("b", None).await);
    assert!(cache.exists("c", None).await);
    assert!(cache.exists("d", None).await);

    let stats = cache.stats();
    assert_eq!(stats.size_evictions, 1);
    assert_eq!(stats.evictions, 1);
    assert_eq!(stats.current_size, 3);
}

#[tokio::test]
async fn test_memory_pressure_eviction() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache_at(&clock).max_size(1000).max_memory_mb(1).build();

    let big = json!("x".repeat(600_000));
    cache.set("first", &big, &SetOptions::default()).await;
    cache.set("second", &big, &SetOptions::default()).await;

    // Two 600 KB payloads exceed the 1 MB ceiling; the older one goes.
    assert!(!cache.exists("first", None).await);
    assert!(cache.exists("second", None).await);

    let stats = cache.stats();
    assert_eq!(stats.memory_evictions, 1);
    assert_eq!(stats.current_size, 1);
    assert!(stats.current_memory_bytes <= 1024 * 1024);
}

#[tokio::test]
async fn test_mget_mset() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache_at(&clock).build();

    let pairs = [("a", json!(1)), ("b", json!(2))];
    assert!(cache.mset(&pairs, &SetOptions::default()).await);

    let values = cache.mget(&["a", "missing", "b"], None).await;
    assert_eq!(values, vec![Some(json!(1)), None, Some(json!(2))]);
}

#[tokio::test]
async fn test_namespace_isolation_and_flush() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache_at(&clock).build();

    let sessions = SetOptions::default().with_namespace("sessions");
    cache.set("42", &json!("s"), &sessions).await;
    cache.set("42", &json!("global"), &SetOptions::default()).await;

    let scoped = GetOptions::default().with_namespace("sessions");
    assert_eq!(cache.get("42", &scoped).await, Some(json!("s")));
    assert_eq!(cache.get("42", &GetOptions::default()).await, Some(json!("global")));

    assert_eq!(cache.flush_namespace("sessions").await, 1);
    assert_eq!(cache.get("42", &scoped).await, None);
    assert_eq!(cache.get("42", &GetOptions::default()).await, Some(json!("global")));
}

#[tokio::test]
async fn test_del_pattern_is_idempotent() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache_at(&clock).build();

    cache.set("user:1", &json!(1), &SetOptions::default()).await;
    cache.set("user:2", &json!(2), &SetOptions::default()).await;
    cache.set("order:1", &json!(3), &SetOptions::default()).await;

    assert_eq!(cache.del_pattern("user:*").await, 2);
    assert_eq!(cache.del_pattern("user:*").await, 0);
    assert!(cache.exists("order:1", None).await);
    assert_eq!(cache.stats().deletes, 2);
}

#[tokio::test]
async fn test_keys_listing_skips_expired() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache_at(&clock).build();

    cache.set("user:1", &json!(1), &SetOptions::default()).await;
    cache.set("user:2", &json!(2), &SetOptions::default().with_ttl(5)).await;
    clock.advance(6_000);

    let mut keys = cache.keys("user:*");
    keys.sort();
    assert_eq!(keys, vec!["user:1".to_owned()]);
}

#[tokio::test]
async fn test_resize_applies_eviction_immediately() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache_at(&clock).max_size(10).build();

    for i in 0..10 {
        cache.set(&format!("k{i}"), &json!(i), &SetOptions::default()).await;
    }
    assert_eq!(cache.stats().current_size, 10);

    cache.resize(4);
    let stats = cache.stats();
    assert_eq!(stats.current_size, 4);
    assert_eq!(stats.size_evictions, 6);

    // The four most recently written entries survive.
    for i in 6..10 {
        assert!(cache.exists(&format!("k{i}"), None).await);
    }
}

#[tokio::test]
async fn test_stats_lifecycle() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache_at(&clock).build();

    cache.set("k", &json!(1), &SetOptions::default()).await;
    cache.get("k", &GetOptions::default()).await;
    cache.get("missing", &GetOptions::default()).await;
    cache.del("k", None).await;

    let stats = cache.stats();
    assert_eq!(stats.sets, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.deletes, 1);
    assert_eq!(stats.hit_ratio(), Some(0.5));

    // Counters reset, residency figures do not.
    cache.set("other", &json!(2), &SetOptions::default()).await;
    cache.reset_stats();
    let after = cache.stats();
    assert_eq!(after.sets, 0);
    assert_eq!(after.hits, 0);
    assert_eq!(after.current_size, 1);
}

#[tokio::test(start_paused = true)]
async fn test_periodic_sweep_reclaims_expired_entries() {
    let clock = Arc::new(ManualClock::new(0));
    let sweep_clock: Arc<dyn tiercache_core::Clock> = clock.clone();
    let cache = MemoryCache::builder()
        .check_interval(1)
        .clock(sweep_clock)
        .build();
    assert!(cache.init().await);

    cache.set("stale", &json!(1), &SetOptions::default().with_ttl(1)).await;
    cache.set("fresh", &json!(2), &SetOptions::default()).await;
    clock.advance(2_000);

    // Nothing has touched "stale", only the sweeper can reclaim it.
    tokio::time::sleep(Duration::from_millis(2_500)).await;

    let stats = cache.stats();
    assert_eq!(stats.current_size, 1);
    assert_eq!(stats.ttl_expired, 1);
    cache.close().await;
}

#[tokio::test]
async fn test_health_is_healthy_by_default() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache_at(&clock).build();
    let report = cache.health_check().await;
    assert_eq!(report.status, HealthStatus::Healthy);
    assert!(report.reasons.is_empty());
}

#[tokio::test]
async fn test_health_warns_near_memory_ceiling() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache_at(&clock).max_memory_mb(1).build();

    // Just under the ceiling but past the 90% warning line.
    cache.set("big", &json!("x".repeat(1_000_000)), &SetOptions::default()).await;
    assert!(cache.exists("big", None).await);

    let report = cache.health_check().await;
    assert_eq!(report.status, HealthStatus::Warning);
    assert!(report.reasons.iter().any(|r| r.contains("memory")));
}

#[tokio::test]
async fn test_health_warns_on_eviction_churn() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache_at(&clock).max_size(10).build();

    for i in 0..120 {
        cache.set(&format!("k{i}"), &json!(i), &SetOptions::default()).await;
    }

    let report = cache.health_check().await;
    assert_eq!(report.status, HealthStatus::Warning);
    assert!(report.reasons.iter().any(|r| r.contains("evictions")));
}

#[tokio::test]
async fn test_shared_singleton_returns_same_instance() {
    let a = tiercache_memory::shared();
    let b = tiercache_memory::shared();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(a.is_available());
}
