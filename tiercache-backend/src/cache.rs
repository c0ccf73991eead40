use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tiercache_core::{CacheStats, HealthReport};

use crate::{GetOptions, IncrOptions, SetOptions};

/// Remaining TTL reported for a key that does not exist (or has expired).
pub const TTL_MISSING: i64 = -2;

/// Remaining TTL reported for a key that exists without an expiry.
pub const TTL_NO_EXPIRY: i64 = -1;

/// The uniform cache contract.
///
/// Implemented by the in-process backend and the remote backend with
/// identical semantics, despite fundamentally different execution
/// models. Callers depend only on this trait; each backend decides
/// eviction, reconnection and serialization internally and surfaces the
/// outcome through the shared stats shape.
///
/// Operations never fail loudly: when a backend is unavailable or an
/// internal error is absorbed, reads resolve to the caller's fallback
/// and mutations resolve to `false`.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Prepares the backend for use.
    ///
    /// Idempotent: a second call on a live instance is a no-op returning
    /// `true`. Bounded: a backend that cannot become ready resolves to
    /// `false` within its configured timeout instead of blocking.
    async fn init(&self) -> bool;

    /// True when the backend will actually attempt operations.
    ///
    /// When false, every operation short-circuits to its unavailable
    /// return value without touching the underlying store.
    fn is_available(&self) -> bool;

    /// Reads a value.
    ///
    /// Returns the stored value on a hit; on a miss (absent key, expired
    /// entry, or unavailable backend) returns `opts.fallback`, which
    /// defaults to `None`.
    async fn get(&self, key: &str, opts: &GetOptions) -> Option<Value>;

    /// Writes a value.
    ///
    /// With `opts.nx`, an existing live value wins and the call returns
    /// `false` without modifying state. Returns `true` when the write
    /// was applied.
    async fn set(&self, key: &str, value: &Value, opts: &SetOptions) -> bool;

    /// Removes a key. Returns whether something was removed.
    async fn del(&self, key: &str, namespace: Option<&str>) -> bool;

    /// True when the key has a live (non-expired) value.
    async fn exists(&self, key: &str, namespace: Option<&str>) -> bool;

    /// Remaining lifetime of a key in whole seconds.
    ///
    /// [`TTL_MISSING`] when the key does not exist or has expired,
    /// [`TTL_NO_EXPIRY`] when it exists without an expiry.
    async fn ttl(&self, key: &str, namespace: Option<&str>) -> i64;

    /// Rewrites a key's expiry. `seconds == 0` clears the expiry.
    ///
    /// Returns `false` when the key does not exist.
    async fn expire(&self, key: &str, seconds: u64, namespace: Option<&str>) -> bool;

    /// Atomically adjusts a numeric counter, creating it if needed.
    ///
    /// An absent key or a non-numeric stored value counts as `0`, so the
    /// first increment of a corrupt counter yields `opts.amount` rather
    /// than an error. `opts.ttl` applies only when the counter is first
    /// created. Returns the new value, or `None` when the backend is
    /// unavailable.
    async fn incr(&self, key: &str, opts: &IncrOptions) -> Option<i64>;

    /// Reads many keys in one call.
    ///
    /// The result has the same length and order as `keys`. Individual
    /// malformed entries are skipped (counted as misses) without failing
    /// the batch.
    async fn mget(&self, keys: &[&str], namespace: Option<&str>) -> Vec<Option<Value>>;

    /// Writes many pairs in one call. Returns `true` when the batch was
    /// applied.
    async fn mset(&self, pairs: &[(&str, Value)], opts: &SetOptions) -> bool;

    /// Deletes every key matching a logical pattern (single `*`
    /// wildcard). Returns the number of keys removed.
    async fn del_pattern(&self, pattern: &str) -> u64;

    /// Deletes every key in a namespace. Returns the number removed.
    async fn flush_namespace(&self, namespace: &str) -> u64;

    /// Snapshot of the lifetime counters.
    fn stats(&self) -> CacheStats;

    /// Zeroes the lifetime counters. Never happens implicitly.
    fn reset_stats(&self);

    /// Probes the backend and derives a health verdict.
    async fn health_check(&self) -> HealthReport;

    /// Releases backend resources (background tasks, connections).
    async fn close(&self);
}

#[async_trait]
impl Cache for Box<dyn Cache> {
    async fn init(&self) -> bool {
        (**self).init().await
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    async fn get(&self, key: &str, opts: &GetOptions) -> Option<Value> {
        (**self).get(key, opts).await
    }

    async fn set(&self, key: &str, value: &Value, opts: &SetOptions) -> bool {
        (**self).set(key, value, opts).await
    }

    async fn del(&self, key: &str, namespace: Option<&str>) -> bool {
        (**self).del(key, namespace).await
    }

    async fn exists(&self, key: &str, namespace: Option<&str>) -> bool {
        (**self).exists(key, namespace).await
    }

    async fn ttl(&self, key: &str, namespace: Option<&str>) -> i64 {
        (**self).ttl(key, namespace).await
    }

    async fn expire(&self, key: &str, seconds: u64, namespace: Option<&str>) -> bool {
        (**self).expire(key, seconds, namespace).await
    }

    async fn incr(&self, key: &str, opts: &IncrOptions) -> Option<i64> {
        (**self).incr(key, opts).await
    }

    async fn mget(&self, keys: &[&str], namespace: Option<&str>) -> Vec<Option<Value>> {
        (**self).mget(keys, namespace).await
    }

    async fn mset(&self, pairs: &[(&str, Value)], opts: &SetOptions) -> bool {
        (**self).mset(pairs, opts).await
    }

    async fn del_pattern(&self, pattern: &str) -> u64 {
        (**self).del_pattern(pattern).await
    }

    async fn flush_namespace(&self, namespace: &str) -> u64 {
        (**self).flush_namespace(namespace).await
    }

    fn stats(&self) -> CacheStats {
        (**self).stats()
    }

    fn reset_stats(&self) {
        (**self).reset_stats()
    }

    async fn health_check(&self) -> HealthReport {
        (**self).health_check().await
    }

    async fn close(&self) {
        (**self).close().await
    }
}

#[async_trait]
impl Cache for Arc<dyn Cache> {
    async fn init(&self) -> bool {
        (**self).init().await
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    async fn get(&self, key: &str, opts: &GetOptions) -> Option<Value> {
        (**self).get(key, opts).await
    }

    async fn set(&self, key: &str, value: &Value, opts: &SetOptions) -> bool {
        (**self).set(key, value, opts).await
    }

    async fn del(&self, key: &str, namespace: Option<&str>) -> bool {
        (**self).del(key, namespace).await
    }

    async fn exists(&self, key: &str, namespace: Option<&str>) -> bool {
        (**self).exists(key, namespace).await
    }

    async fn ttl(&self, key: &str, namespace: Option<&str>) -> i64 {
        (**self).ttl(key, namespace).await
    }

    async fn expire(&self, key: &str, seconds: u64, namespace: Option<&str>) -> bool {
        (**self).expire(key, seconds, namespace).await
    }

    async fn incr(&self, key: &str, opts: &IncrOptions) -> Option<i64> {
        (**self).incr(key, opts).await
    }

    async fn mget(&self, keys: &[&str], namespace: Option<&str>) -> Vec<Option<Value>> {
        (**self).mget(keys, namespace).await
    }

    async fn mset(&self, pairs: &[(&str, Value)], opts: &SetOptions) -> bool {
        (**self).mset(pairs, opts).await
    }

    async fn del_pattern(&self, pattern: &str) -> u64 {
        (**self).del_pattern(pattern).await
    }

    async fn flush_namespace(&self, namespace: &str) -> u64 {
        (**self).flush_namespace(namespace).await
    }

    fn stats(&self) -> CacheStats {
        (**self).stats()
    }

    fn reset_stats(&self) {
        (**self).reset_stats()
    }

    async fn health_check(&self) -> HealthReport {
        (**self).health_check().await
    }

    async fn close(&self) {
        (**self).close().await
    }
}
