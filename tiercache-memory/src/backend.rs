//! In-process cache backend implementation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use smol_str::SmolStr;
use tiercache_backend::{
    Cache, GetOptions, IncrOptions, SetOptions, TTL_MISSING, TTL_NO_EXPIRY,
};
use tiercache_core::{CacheStats, Clock, HealthReport, KeyBuilder, Metrics, pattern_matches};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::builder::MemoryCacheBuilder;
use crate::entry::CacheEntry;

const POISONED: &str = "cache state mutex poisoned";

/// Memory usage above this fraction of the ceiling flags a warning.
const MEMORY_WARNING_RATIO: f64 = 0.9;
/// Evictions above this fraction of sets since the last reset flag a
/// warning, once enough sets have happened to be meaningful.
const EVICTION_WARNING_RATIO: f64 = 0.1;
const EVICTION_WARNING_MIN_SETS: u64 = 100;

struct Config {
    max_memory_bytes: usize,
    default_ttl: u64,
    check_interval: u64,
    kind_ttls: HashMap<SmolStr, u64>,
}

/// Map state guarded by one mutex; never held across an `await`, so
/// every operation is atomic from the caller's perspective.
struct Inner {
    map: HashMap<String, CacheEntry>,
    /// Monotonic logical clock ranking recency for LRU eviction.
    access_clock: u64,
    /// Running total of entry footprint estimates.
    memory_bytes: usize,
    /// Resident-count ceiling; mutable through `resize`.
    max_size: usize,
}

impl Inner {
    fn remove(&mut self, full_key: &str) -> Option<CacheEntry> {
        let old = self.map.remove(full_key)?;
        self.memory_bytes = self.memory_bytes.saturating_sub(old.memory_size);
        Some(old)
    }

    fn apply_delta(&mut self, delta: isize) {
        if delta >= 0 {
            self.memory_bytes += delta as usize;
        } else {
            self.memory_bytes = self.memory_bytes.saturating_sub(delta.unsigned_abs());
        }
    }

    /// Key with the smallest access-order value, the LRU victim.
    fn lru_key(&self) -> Option<String> {
        self.map
            .iter()
            .min_by_key(|(_, entry)| entry.access_order)
            .map(|(key, _)| key.clone())
    }
}

enum Lookup {
    Missing,
    Expired,
    Live,
}

struct Shared {
    state: Mutex<Inner>,
    metrics: Metrics,
    clock: Arc<dyn Clock>,
    key_builder: KeyBuilder,
    config: Config,
}

impl Shared {
    fn lookup(inner: &Inner, full_key: &str, now: i64) -> Lookup {
        match inner.map.get(full_key) {
            None => Lookup::Missing,
            Some(entry) if entry.is_expired(now) => Lookup::Expired,
            Some(_) => Lookup::Live,
        }
    }

    /// Reclaims one expired entry discovered in passing.
    fn reclaim_expired(&self, inner: &mut Inner, full_key: &str) {
        inner.remove(full_key);
        self.metrics.record_ttl_expired(1);
    }

    /// Resolves the effective TTL in milliseconds.
    ///
    /// Precedence: explicit TTL, then the kind's configured default,
    /// then the cache-wide default. A resolved value of zero seconds
    /// means "never expire" and yields `None`.
    fn effective_ttl_millis(&self, explicit: Option<u64>, kind: Option<&str>) -> Option<i64> {
        let seconds = match explicit {
            Some(seconds) => seconds,
            None => kind
                .and_then(|k| self.config.kind_ttls.get(k).copied())
                .unwrap_or(self.config.default_ttl),
        };
        if seconds == 0 {
            None
        } else {
            Some((seconds as i64).saturating_mul(1000))
        }
    }

    /// Applies count pressure then memory pressure, one LRU victim at a
    /// time, re-checking both ceilings after every single eviction.
    fn evict(&self, inner: &mut Inner) {
        loop {
            if inner.map.len() > inner.max_size {
                if let Some(victim) = inner.lru_key() {
                    inner.remove(&victim);
                    self.metrics.record_size_eviction();
                    trace!(key = %victim, "evicted entry under count pressure");
                    continue;
                }
            }
            if inner.memory_bytes > self.config.max_memory_bytes && !inner.map.is_empty() {
                if let Some(victim) = inner.lru_key() {
                    inner.remove(&victim);
                    self.metrics.record_memory_eviction();
                    trace!(key = %victim, "evicted entry under memory pressure");
                    continue;
                }
            }
            break;
        }
    }

    fn get_value(&self, key: &str, namespace: Option<&str>) -> Option<Value> {
        let full_key = self.key_builder.build(key, namespace);
        let now = self.clock.now_millis();
        let mut inner = self.state.lock().expect(POISONED);

        match Self::lookup(&inner, &full_key, now) {
            Lookup::Missing => {
                self.metrics.record_miss();
                None
            }
            Lookup::Expired => {
                self.reclaim_expired(&mut inner, &full_key);
                self.metrics.record_miss();
                None
            }
            Lookup::Live => {
                inner.access_clock += 1;
                let order = inner.access_clock;
                let value = inner.map.get_mut(&full_key).map(|entry| {
                    entry.access_order = order;
                    entry.value.clone()
                });
                self.metrics.record_hit();
                value
            }
        }
    }

    fn set_value(&self, key: &str, value: &Value, opts: &SetOptions) -> bool {
        let full_key = self.key_builder.build(key, opts.namespace.as_deref());
        let now = self.clock.now_millis();
        let mut inner = self.state.lock().expect(POISONED);

        if opts.nx {
            if let Lookup::Live = Self::lookup(&inner, &full_key, now) {
                return false;
            }
        }

        let ttl_millis = self.effective_ttl_millis(opts.ttl, opts.kind.as_deref());
        inner.access_clock += 1;
        let order = inner.access_clock;
        let entry = CacheEntry::new(
            value.clone(),
            now,
            ttl_millis,
            opts.kind.clone(),
            full_key.len(),
            order,
        );
        let added = entry.memory_size;
        if let Some(old) = inner.map.insert(full_key, entry) {
            inner.memory_bytes = inner.memory_bytes.saturating_sub(old.memory_size);
        }
        inner.memory_bytes += added;
        self.metrics.record_set();
        self.evict(&mut inner);
        true
    }

    fn del_value(&self, key: &str, namespace: Option<&str>) -> bool {
        let full_key = self.key_builder.build(key, namespace);
        let mut inner = self.state.lock().expect(POISONED);
        if inner.remove(&full_key).is_some() {
            self.metrics.record_deletes(1);
            true
        } else {
            false
        }
    }

    fn exists_value(&self, key: &str, namespace: Option<&str>) -> bool {
        let full_key = self.key_builder.build(key, namespace);
        let now = self.clock.now_millis();
        let mut inner = self.state.lock().expect(POISONED);
        match Self::lookup(&inner, &full_key, now) {
            Lookup::Missing => false,
            Lookup::Expired => {
                self.reclaim_expired(&mut inner, &full_key);
                false
            }
            Lookup::Live => true,
        }
    }

    fn ttl_value(&self, key: &str, namespace: Option<&str>) -> i64 {
        let full_key = self.key_builder.build(key, namespace);
        let now = self.clock.now_millis();
        let mut inner = self.state.lock().expect(POISONED);

        let remaining = match inner.map.get(&full_key) {
            None => return TTL_MISSING,
            Some(entry) if entry.is_expired(now) => None,
            Some(entry) => Some(entry.remaining_secs(now)),
        };
        match remaining {
            None => {
                self.reclaim_expired(&mut inner, &full_key);
                TTL_MISSING
            }
            Some(None) => TTL_NO_EXPIRY,
            Some(Some(seconds)) => seconds,
        }
    }

    fn expire_value(&self, key: &str, seconds: u64, namespace: Option<&str>) -> bool {
        let full_key = self.key_builder.build(key, namespace);
        let now = self.clock.now_millis();
        let mut inner = self.state.lock().expect(POISONED);

        match Self::lookup(&inner, &full_key, now) {
            Lookup::Missing => false,
            Lookup::Expired => {
                self.reclaim_expired(&mut inner, &full_key);
                false
            }
            Lookup::Live => {
                if let Some(entry) = inner.map.get_mut(&full_key) {
                    entry.expires_at = if seconds == 0 {
                        None
                    } else {
                        Some(now + (seconds as i64).saturating_mul(1000))
                    };
                }
                true
            }
        }
    }

    fn incr_value(&self, key: &str, opts: &IncrOptions) -> i64 {
        let full_key = self.key_builder.build(key, opts.namespace.as_deref());
        let now = self.clock.now_millis();
        let mut inner = self.state.lock().expect(POISONED);

        let current = match inner.map.get(&full_key) {
            None => None,
            Some(entry) if entry.is_expired(now) => {
                // The old counter is logically absent; start over.
                None
            }
            // A non-numeric stored value is silently reset to zero.
            Some(entry) => Some(entry.value.as_i64().unwrap_or(0)),
        };

        match current {
            Some(current) => {
                let next = current.saturating_add(opts.amount);
                inner.access_clock += 1;
                let order = inner.access_clock;
                let key_len = full_key.len();
                let delta = inner.map.get_mut(&full_key).map(|entry| {
                    entry.access_order = order;
                    entry.replace_value(Value::from(next), key_len)
                });
                if let Some(delta) = delta {
                    inner.apply_delta(delta);
                }
                self.evict(&mut inner);
                next
            }
            None => {
                if inner.map.contains_key(&full_key) {
                    self.reclaim_expired(&mut inner, &full_key);
                }
                let next = opts.amount;
                let ttl_millis = self.effective_ttl_millis(opts.ttl, None);
                inner.access_clock += 1;
                let order = inner.access_clock;
                let entry = CacheEntry::new(
                    Value::from(next),
                    now,
                    ttl_millis,
                    None,
                    full_key.len(),
                    order,
                );
                inner.memory_bytes += entry.memory_size;
                inner.map.insert(full_key, entry);
                self.evict(&mut inner);
                next
            }
        }
    }

    fn del_pattern_value(&self, pattern: &str) -> u64 {
        let mut inner = self.state.lock().expect(POISONED);
        let victims: Vec<String> = inner
            .map
            .keys()
            .filter(|full_key| {
                self.key_builder
                    .strip(full_key)
                    .is_some_and(|logical| pattern_matches(pattern, logical))
            })
            .cloned()
            .collect();
        for full_key in &victims {
            inner.remove(full_key);
        }
        let removed = victims.len() as u64;
        if removed > 0 {
            self.metrics.record_deletes(removed);
            debug!(pattern, removed, "pattern delete");
        }
        removed
    }

    /// Hard-deletes every entry whose expiry has passed.
    ///
    /// Passive expiry alone would leave keys nobody reads resident
    /// indefinitely; the sweep reclaims their memory.
    fn sweep(&self) -> u64 {
        let now = self.clock.now_millis();
        let mut inner = self.state.lock().expect(POISONED);
        let victims: Vec<String> = inner
            .map
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for full_key in &victims {
            inner.remove(full_key);
        }
        let removed = victims.len() as u64;
        if removed > 0 {
            self.metrics.record_ttl_expired(removed);
        }
        removed
    }

    fn health_report(&self) -> HealthReport {
        let (size, memory_bytes) = {
            let inner = self.state.lock().expect(POISONED);
            (inner.map.len(), inner.memory_bytes)
        };
        let stats = self.metrics.snapshot(size as u64, memory_bytes as u64);

        let mut reasons = Vec::new();
        let ceiling = self.config.max_memory_bytes;
        if ceiling > 0 && memory_bytes as f64 > ceiling as f64 * MEMORY_WARNING_RATIO {
            reasons.push(format!(
                "memory usage {memory_bytes} bytes is above 90% of the {ceiling} byte ceiling"
            ));
        }
        if stats.sets >= EVICTION_WARNING_MIN_SETS
            && stats.evictions as f64 > stats.sets as f64 * EVICTION_WARNING_RATIO
        {
            reasons.push(format!(
                "{} evictions across {} sets since the last stats reset",
                stats.evictions, stats.sets
            ));
        }

        // This backend can be under pressure but never unreachable.
        if reasons.is_empty() {
            HealthReport::healthy()
        } else {
            HealthReport::warning(reasons)
        }
    }
}

/// In-process bounded cache.
///
/// A hashed map plus a monotonic access-order counter, guarded by a
/// single mutex. Three eviction pressures keep it bounded: an entry
/// count ceiling and a soft memory ceiling (both resolved LRU-first,
/// one victim at a time) and TTL expiry (resolved passively on access
/// and by a periodic sweep task started by [`init`](Cache::init)).
///
/// # Examples
///
/// ```no_run
/// use serde_json::json;
/// use tiercache_backend::{Cache, GetOptions, SetOptions};
/// use tiercache_memory::MemoryCache;
///
/// # async fn example() {
/// let cache = MemoryCache::builder().max_size(10_000).build();
/// cache.init().await;
///
/// cache.set("greeting", &json!("hello"), &SetOptions::default().with_ttl(60)).await;
/// let value = cache.get("greeting", &GetOptions::default()).await;
/// assert_eq!(value, Some(json!("hello")));
/// # }
/// ```
pub struct MemoryCache {
    shared: Arc<Shared>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryCache {
    /// Creates a builder with default settings.
    pub fn builder() -> MemoryCacheBuilder {
        MemoryCacheBuilder::new()
    }

    pub(crate) fn from_builder(builder: MemoryCacheBuilder, key_builder: KeyBuilder) -> Self {
        MemoryCache {
            shared: Arc::new(Shared {
                state: Mutex::new(Inner {
                    map: HashMap::new(),
                    access_clock: 0,
                    memory_bytes: 0,
                    max_size: builder.max_size,
                }),
                metrics: Metrics::new(),
                clock: builder.clock,
                key_builder,
                config: Config {
                    max_memory_bytes: builder.max_memory_mb * 1024 * 1024,
                    default_ttl: builder.default_ttl,
                    check_interval: builder.check_interval,
                    kind_ttls: builder.kind_ttls,
                },
            }),
            sweeper: Mutex::new(None),
        }
    }

    /// Lists the logical keys matching a pattern (single `*` wildcard).
    ///
    /// Expired-but-resident entries are treated as absent. This listing
    /// is inherent to the in-process backend; the remote backend only
    /// supports pattern deletion, which scans incrementally.
    pub fn keys(&self, pattern: &str) -> Vec<String> {
        let now = self.shared.clock.now_millis();
        let inner = self.shared.state.lock().expect(POISONED);
        inner
            .map
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .filter_map(|(full_key, _)| self.shared.key_builder.strip(full_key))
            .filter(|logical| pattern_matches(pattern, logical))
            .map(str::to_owned)
            .collect()
    }

    /// Changes the resident-count ceiling and immediately applies
    /// eviction, so the cache never sits above the new ceiling.
    pub fn resize(&self, new_max_size: usize) {
        let mut inner = self.shared.state.lock().expect(POISONED);
        inner.max_size = new_max_size;
        self.shared.evict(&mut inner);
    }

    fn start_sweeper(&self) {
        let mut guard = self.sweeper.lock().expect(POISONED);
        if guard.is_some() || self.shared.config.check_interval == 0 {
            return;
        }
        let shared = Arc::clone(&self.shared);
        let period = Duration::from_secs(self.shared.config.check_interval);
        debug!(period_secs = self.shared.config.check_interval, "starting expiry sweeper");
        *guard = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately; skip it so sweeps
            // start one full period after init.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let reclaimed = shared.sweep();
                if reclaimed > 0 {
                    trace!(reclaimed, "sweep reclaimed expired entries");
                }
            }
        }));
    }

    fn stop_sweeper(&self) {
        let mut guard = self.sweeper.lock().expect(POISONED);
        if let Some(handle) = guard.take() {
            handle.abort();
        }
    }
}

impl Drop for MemoryCache {
    fn drop(&mut self) {
        self.stop_sweeper();
    }
}

#[async_trait]
impl Cache for MemoryCache {
    /// Starts the periodic sweep task. Idempotent; always succeeds.
    async fn init(&self) -> bool {
        self.start_sweeper();
        true
    }

    /// The in-process backend cannot be unreachable.
    fn is_available(&self) -> bool {
        true
    }

    async fn get(&self, key: &str, opts: &GetOptions) -> Option<Value> {
        match self.shared.get_value(key, opts.namespace.as_deref()) {
            Some(value) => Some(value),
            None => opts.fallback.clone(),
        }
    }

    async fn set(&self, key: &str, value: &Value, opts: &SetOptions) -> bool {
        self.shared.set_value(key, value, opts)
    }

    async fn del(&self, key: &str, namespace: Option<&str>) -> bool {
        self.shared.del_value(key, namespace)
    }

    async fn exists(&self, key: &str, namespace: Option<&str>) -> bool {
        self.shared.exists_value(key, namespace)
    }

    async fn ttl(&self, key: &str, namespace: Option<&str>) -> i64 {
        self.shared.ttl_value(key, namespace)
    }

    async fn expire(&self, key: &str, seconds: u64, namespace: Option<&str>) -> bool {
        self.shared.expire_value(key, seconds, namespace)
    }

    async fn incr(&self, key: &str, opts: &IncrOptions) -> Option<i64> {
        Some(self.shared.incr_value(key, opts))
    }

    async fn mget(&self, keys: &[&str], namespace: Option<&str>) -> Vec<Option<Value>> {
        keys.iter()
            .map(|key| self.shared.get_value(key, namespace))
            .collect()
    }

    async fn mset(&self, pairs: &[(&str, Value)], opts: &SetOptions) -> bool {
        for (key, value) in pairs {
            self.shared.set_value(key, value, opts);
        }
        true
    }

    async fn del_pattern(&self, pattern: &str) -> u64 {
        self.shared.del_pattern_value(pattern)
    }

    async fn flush_namespace(&self, namespace: &str) -> u64 {
        self.shared
            .del_pattern_value(&KeyBuilder::namespace_pattern(namespace))
    }

    fn stats(&self) -> CacheStats {
        let (size, memory_bytes) = {
            let inner = self.shared.state.lock().expect(POISONED);
            (inner.map.len() as u64, inner.memory_bytes as u64)
        };
        self.shared.metrics.snapshot(size, memory_bytes)
    }

    fn reset_stats(&self) {
        self.shared.metrics.reset();
    }

    async fn health_check(&self) -> HealthReport {
        self.shared.health_report()
    }

    /// Stops the sweep task. Entries stay resident until drop.
    async fn close(&self) {
        self.stop_sweeper();
    }
}

static SHARED_CACHE: OnceLock<Arc<MemoryCache>> = OnceLock::new();

/// Process-scoped singleton cache.
///
/// Created with default settings on first access. Callers are expected
/// to run [`init`](Cache::init) once from async context to start the
/// sweeper, and [`close`](Cache::close) on process shutdown.
pub fn shared() -> Arc<MemoryCache> {
    Arc::clone(SHARED_CACHE.get_or_init(|| Arc::new(MemoryCache::builder().build())))
}
