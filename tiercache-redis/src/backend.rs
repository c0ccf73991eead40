//! Redis backend implementation.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::{Client, aio::ConnectionManager};
use serde_json::Value;
use smol_str::SmolStr;
use tiercache_backend::{
    Cache, CacheError, GetOptions, IncrOptions, SetOptions, TTL_MISSING, codec,
};
use tiercache_core::{CacheStats, HealthReport, KeyBuilder, Metrics};
use tracing::{debug, trace, warn};

use crate::error::Error;

const POISONED: &str = "connection lock poisoned";

/// Remote cache backend based on the redis-rs crate.
///
/// Uses a [`ConnectionManager`] for asynchronous network interaction;
/// the single managed connection is shared by all operations and
/// multiplexed by the transport. Two concurrent writes to the same key
/// race at the service: last write wins.
///
/// The backend never throws on outages. Until [`init`](Cache::init)
/// succeeds, and again after [`close`](Cache::close), the availability
/// gate is down and every operation resolves to its unavailable value
/// (fallback for reads, `false` for mutations) without touching the
/// network or the error counters.
///
/// [`ConnectionManager`]: redis::aio::ConnectionManager
pub struct RedisCache {
    client: Client,
    connection: RwLock<Option<ConnectionManager>>,
    initialized: AtomicBool,
    key_builder: KeyBuilder,
    metrics: Metrics,
    connect_timeout: Duration,
    scan_count: usize,
    batch_size: usize,
    default_ttl: u64,
}

impl RedisCache {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn builder() -> RedisCacheBuilder {
        RedisCacheBuilder::default()
    }

    /// Snapshot of the current connection, if the gate is up.
    ///
    /// The manager is cloned out so no lock is held across an `await`.
    fn connection(&self) -> Option<ConnectionManager> {
        if !self.initialized.load(Ordering::SeqCst) {
            return None;
        }
        self.connection.read().expect(POISONED).clone()
    }

    fn effective_ttl(&self, explicit: Option<u64>) -> Option<u64> {
        let seconds = explicit.unwrap_or(self.default_ttl);
        if seconds == 0 { None } else { Some(seconds) }
    }

    /// Absorbs a command failure: converted to the shared error type,
    /// counted, logged, never propagated.
    fn absorb(&self, operation: &str, error: impl Into<CacheError>) {
        let error = error.into();
        warn!(%error, operation, "redis operation failed");
        self.metrics.record_error(error);
    }

    async fn delete_chunk(&self, con: &mut ConnectionManager, chunk: &[String]) -> u64 {
        if chunk.is_empty() {
            return 0;
        }
        let mut cmd = redis::cmd("DEL");
        for key in chunk {
            cmd.arg(key);
        }
        match cmd.query_async::<i64>(con).await {
            Ok(deleted) => deleted.max(0) as u64,
            Err(err) => {
                self.absorb("del_pattern", Error::Redis(err));
                0
            }
        }
    }

    /// Parses the service's free-form `INFO memory` report into a
    /// structured map (for example `used_memory`, `used_memory_human`).
    ///
    /// Returns `None` when the backend is unavailable or the probe
    /// fails, rather than throwing.
    pub async fn memory_info(&self) -> Option<HashMap<String, String>> {
        let mut con = self.connection()?;
        match redis::cmd("INFO")
            .arg("memory")
            .query_async::<String>(&mut con)
            .await
        {
            Ok(raw) => Some(parse_info(&raw)),
            Err(err) => {
                self.absorb("memory_info", Error::Redis(err));
                None
            }
        }
    }
}

fn parse_info(raw: &str) -> HashMap<String, String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(':'))
        .map(|(field, value)| (field.to_owned(), value.to_owned()))
        .collect()
}

/// Part of builder pattern implementation for [`RedisCache`].
pub struct RedisCacheBuilder {
    connection_info: String,
    key_prefix: SmolStr,
    connect_timeout: Duration,
    scan_count: usize,
    batch_size: usize,
    default_ttl: u64,
}

impl Default for RedisCacheBuilder {
    fn default() -> Self {
        RedisCacheBuilder {
            connection_info: "redis://127.0.0.1/".to_owned(),
            key_prefix: SmolStr::new_static("cache"),
            connect_timeout: Duration::from_secs(5),
            scan_count: 100,
            batch_size: 100,
            default_ttl: 0,
        }
    }
}

impl RedisCacheBuilder {
    /// Set connection info (host, port, database, etc.).
    pub fn server(mut self, connection_info: impl Into<String>) -> Self {
        self.connection_info = connection_info.into();
        self
    }

    /// Prefix applied to every physical key.
    pub fn key_prefix(mut self, prefix: impl Into<SmolStr>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Upper bound on how long [`init`](Cache::init) may take before
    /// resolving to failure instead of blocking the caller.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// COUNT hint passed to each cursor scan step.
    pub fn scan_count(mut self, count: usize) -> Self {
        self.scan_count = count.max(1);
        self
    }

    /// Number of keys deleted per batched DEL during pattern deletion.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Default TTL in seconds for writes without an explicit TTL.
    /// `0` means no expiry by default.
    pub fn default_ttl(mut self, seconds: u64) -> Self {
        self.default_ttl = seconds;
        self
    }

    /// Create a new [`RedisCache`] with the configured settings.
    ///
    /// The network connection is not established here; call
    /// [`init`](Cache::init) before use.
    pub fn build(self) -> Result<RedisCache, Error> {
        Ok(RedisCache {
            client: Client::open(self.connection_info)?,
            connection: RwLock::new(None),
            initialized: AtomicBool::new(false),
            key_builder: KeyBuilder::new(self.key_prefix),
            metrics: Metrics::new(),
            connect_timeout: self.connect_timeout,
            scan_count: self.scan_count,
            batch_size: self.batch_size,
            default_ttl: self.default_ttl,
        })
    }
}

#[async_trait]
impl Cache for RedisCache {
    /// Establishes the managed connection, bounded by the configured
    /// connect timeout. Idempotent: a second call on a connected
    /// instance is a no-op returning `true`. Both a rejected connection
    /// and a timeout resolve to `false`; neither is thrown.
    async fn init(&self) -> bool {
        if self.is_available() {
            return true;
        }
        let attempt = self.client.get_connection_manager();
        match tokio::time::timeout(self.connect_timeout, attempt).await {
            Ok(Ok(manager)) => {
                *self.connection.write().expect(POISONED) = Some(manager);
                self.initialized.store(true, Ordering::SeqCst);
                debug!("redis connection established");
                true
            }
            Ok(Err(err)) => {
                warn!(%err, "redis connection failed");
                self.metrics.record_error(CacheError::from(Error::Redis(err)));
                false
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.connect_timeout.as_secs(),
                    "redis connection attempt timed out"
                );
                self.metrics.record_error(CacheError::Timeout);
                false
            }
        }
    }

    fn is_available(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
            && self.connection.read().expect(POISONED).is_some()
    }

    async fn get(&self, key: &str, opts: &GetOptions) -> Option<Value> {
        let Some(mut con) = self.connection() else {
            return opts.fallback.clone();
        };
        let full_key = self.key_builder.build(key, opts.namespace.as_deref());
        match redis::cmd("GET")
            .arg(&full_key)
            .query_async::<Option<String>>(&mut con)
            .await
        {
            Ok(Some(raw)) => match codec::decode(&raw) {
                Ok(value) => {
                    self.metrics.record_hit();
                    Some(value)
                }
                Err(err) => {
                    // Malformed stored value: a miss for this key, not
                    // a failure.
                    self.absorb("get", err);
                    self.metrics.record_miss();
                    opts.fallback.clone()
                }
            },
            Ok(None) => {
                self.metrics.record_miss();
                opts.fallback.clone()
            }
            Err(err) => {
                self.absorb("get", Error::Redis(err));
                self.metrics.record_miss();
                opts.fallback.clone()
            }
        }
    }

    async fn set(&self, key: &str, value: &Value, opts: &SetOptions) -> bool {
        let Some(mut con) = self.connection() else {
            return false;
        };
        let full_key = self.key_builder.build(key, opts.namespace.as_deref());
        let raw = match codec::encode(value) {
            Ok(raw) => raw,
            Err(err) => {
                self.absorb("set", err);
                return false;
            }
        };
        let ttl = self.effective_ttl(opts.ttl);

        if opts.nx {
            let written = redis::cmd("SET")
                .arg(&full_key)
                .arg(&raw)
                .arg("NX")
                .query_async::<Option<String>>(&mut con)
                .await;
            match written {
                Ok(Some(_)) => {
                    // Separate expire after SET NX: a crash in between
                    // leaves a non-expiring key. Known limitation.
                    if let Some(seconds) = ttl {
                        let expired = redis::cmd("EXPIRE")
                            .arg(&full_key)
                            .arg(seconds)
                            .query_async::<i64>(&mut con)
                            .await;
                        if let Err(err) = expired {
                            self.absorb("set", Error::Redis(err));
                        }
                    }
                    self.metrics.record_set();
                    true
                }
                Ok(None) => false,
                Err(err) => {
                    self.absorb("set", Error::Redis(err));
                    false
                }
            }
        } else {
            let written = match ttl {
                // Atomic set-with-expiry.
                Some(seconds) => {
                    redis::cmd("SET")
                        .arg(&full_key)
                        .arg(&raw)
                        .arg("EX")
                        .arg(seconds)
                        .query_async::<()>(&mut con)
                        .await
                }
                None => {
                    redis::cmd("SET")
                        .arg(&full_key)
                        .arg(&raw)
                        .query_async::<()>(&mut con)
                        .await
                }
            };
            match written {
                Ok(()) => {
                    self.metrics.record_set();
                    true
                }
                Err(err) => {
                    self.absorb("set", Error::Redis(err));
                    false
                }
            }
        }
    }

    async fn del(&self, key: &str, namespace: Option<&str>) -> bool {
        let Some(mut con) = self.connection() else {
            return false;
        };
        let full_key = self.key_builder.build(key, namespace);
        match redis::cmd("DEL")
            .arg(&full_key)
            .query_async::<i64>(&mut con)
            .await
        {
            Ok(deleted) => {
                if deleted > 0 {
                    self.metrics.record_deletes(deleted as u64);
                }
                deleted > 0
            }
            Err(err) => {
                self.absorb("del", Error::Redis(err));
                false
            }
        }
    }

    async fn exists(&self, key: &str, namespace: Option<&str>) -> bool {
        let Some(mut con) = self.connection() else {
            return false;
        };
        let full_key = self.key_builder.build(key, namespace);
        match redis::cmd("EXISTS")
            .arg(&full_key)
            .query_async::<i64>(&mut con)
            .await
        {
            Ok(found) => found > 0,
            Err(err) => {
                self.absorb("exists", Error::Redis(err));
                false
            }
        }
    }

    async fn ttl(&self, key: &str, namespace: Option<&str>) -> i64 {
        let Some(mut con) = self.connection() else {
            return TTL_MISSING;
        };
        let full_key = self.key_builder.build(key, namespace);
        match redis::cmd("TTL")
            .arg(&full_key)
            .query_async::<i64>(&mut con)
            .await
        {
            // The service already speaks the -2/-1/seconds convention.
            Ok(remaining) => remaining,
            Err(err) => {
                self.absorb("ttl", Error::Redis(err));
                TTL_MISSING
            }
        }
    }

    async fn expire(&self, key: &str, seconds: u64, namespace: Option<&str>) -> bool {
        let Some(mut con) = self.connection() else {
            return false;
        };
        let full_key = self.key_builder.build(key, namespace);
        let applied = if seconds == 0 {
            redis::cmd("PERSIST")
                .arg(&full_key)
                .query_async::<i64>(&mut con)
                .await
        } else {
            redis::cmd("EXPIRE")
                .arg(&full_key)
                .arg(seconds)
                .query_async::<i64>(&mut con)
                .await
        };
        match applied {
            Ok(changed) => changed > 0,
            Err(err) => {
                self.absorb("expire", Error::Redis(err));
                false
            }
        }
    }

    async fn incr(&self, key: &str, opts: &IncrOptions) -> Option<i64> {
        let Some(mut con) = self.connection() else {
            return None;
        };
        let full_key = self.key_builder.build(key, opts.namespace.as_deref());

        // INCRBY is atomic at the service; piggyback a TTL probe to
        // detect first creation.
        let outcome: Result<(i64, i64), _> = redis::pipe()
            .cmd("INCRBY")
            .arg(&full_key)
            .arg(opts.amount)
            .cmd("TTL")
            .arg(&full_key)
            .query_async(&mut con)
            .await;

        match outcome {
            Ok((next, current_ttl)) => {
                if let Some(seconds) = self.effective_ttl(opts.ttl) {
                    // TTL applies only on first creation, observed as a
                    // counter with no expiry. Separate call, same crash
                    // window as SET NX + EXPIRE.
                    if current_ttl == -1 {
                        let expired = redis::cmd("EXPIRE")
                            .arg(&full_key)
                            .arg(seconds)
                            .query_async::<i64>(&mut con)
                            .await;
                        if let Err(err) = expired {
                            self.absorb("incr", Error::Redis(err));
                        }
                    }
                }
                Some(next)
            }
            Err(err) => {
                self.absorb("incr", Error::Redis(err));
                None
            }
        }
    }

    async fn mget(&self, keys: &[&str], namespace: Option<&str>) -> Vec<Option<Value>> {
        let Some(mut con) = self.connection() else {
            return vec![None; keys.len()];
        };
        if keys.is_empty() {
            return Vec::new();
        }
        let mut cmd = redis::cmd("MGET");
        for key in keys {
            cmd.arg(self.key_builder.build(key, namespace));
        }
        match cmd.query_async::<Vec<Option<String>>>(&mut con).await {
            Ok(raws) => raws
                .into_iter()
                .map(|raw| match raw {
                    Some(raw) => match codec::decode(&raw) {
                        Ok(value) => {
                            self.metrics.record_hit();
                            Some(value)
                        }
                        Err(err) => {
                            // Skip the malformed entry, keep the batch.
                            self.absorb("mget", err);
                            self.metrics.record_miss();
                            None
                        }
                    },
                    None => {
                        self.metrics.record_miss();
                        None
                    }
                })
                .collect(),
            Err(err) => {
                self.absorb("mget", Error::Redis(err));
                vec![None; keys.len()]
            }
        }
    }

    async fn mset(&self, pairs: &[(&str, Value)], opts: &SetOptions) -> bool {
        let Some(mut con) = self.connection() else {
            return false;
        };
        if pairs.is_empty() {
            return true;
        }

        let mut encoded = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let full_key = self.key_builder.build(key, opts.namespace.as_deref());
            match codec::encode(value) {
                Ok(raw) => encoded.push((full_key, raw)),
                Err(err) => {
                    self.absorb("mset", err);
                    return false;
                }
            }
        }

        // One atomic pipeline: MSET plus per-key expiries, so partial
        // application is avoided as far as the transport allows.
        let mut pipe = redis::pipe();
        pipe.atomic();
        let mut mset_cmd = redis::cmd("MSET");
        for (full_key, raw) in &encoded {
            mset_cmd.arg(full_key).arg(raw);
        }
        pipe.add_command(mset_cmd).ignore();
        if let Some(seconds) = self.effective_ttl(opts.ttl) {
            for (full_key, _) in &encoded {
                pipe.cmd("EXPIRE").arg(full_key).arg(seconds).ignore();
            }
        }

        match pipe.query_async::<()>(&mut con).await {
            Ok(()) => {
                for _ in &encoded {
                    self.metrics.record_set();
                }
                true
            }
            Err(err) => {
                self.absorb("mset", Error::Redis(err));
                false
            }
        }
    }

    /// Cursor-based pattern deletion.
    ///
    /// Repeatedly scans with the cursor returned by the previous step,
    /// deleting matches in bounded batches, until the service reports
    /// cursor `0`. Never lists the whole keyspace in one call.
    async fn del_pattern(&self, pattern: &str) -> u64 {
        let Some(mut con) = self.connection() else {
            return 0;
        };
        let scoped = self.key_builder.scoped(pattern);
        let mut cursor: u64 = 0;
        let mut pending: Vec<String> = Vec::new();
        let mut removed: u64 = 0;

        loop {
            let step = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&scoped)
                .arg("COUNT")
                .arg(self.scan_count)
                .query_async::<(u64, Vec<String>)>(&mut con)
                .await;
            let (next, keys) = match step {
                Ok(step) => step,
                Err(err) => {
                    self.absorb("del_pattern", Error::Redis(err));
                    break;
                }
            };
            pending.extend(keys);

            while pending.len() >= self.batch_size {
                let chunk: Vec<String> = pending.drain(..self.batch_size).collect();
                removed += self.delete_chunk(&mut con, &chunk).await;
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        removed += self.delete_chunk(&mut con, &pending).await;

        if removed > 0 {
            self.metrics.record_deletes(removed);
        }
        trace!(pattern, removed, "pattern delete finished");
        removed
    }

    async fn flush_namespace(&self, namespace: &str) -> u64 {
        self.del_pattern(&KeyBuilder::namespace_pattern(namespace))
            .await
    }

    /// Residency figures are always zero: the remote service owns the
    /// entries, this instance only counts its own operations.
    fn stats(&self) -> CacheStats {
        self.metrics.snapshot(0, 0)
    }

    fn reset_stats(&self) {
        self.metrics.reset();
    }

    /// Liveness probe with measured round-trip latency.
    async fn health_check(&self) -> HealthReport {
        let Some(mut con) = self.connection() else {
            return HealthReport::unhealthy("not connected");
        };
        let started = Instant::now();
        match redis::cmd("PING").query_async::<String>(&mut con).await {
            Ok(_) => HealthReport::healthy_with_latency(started.elapsed()),
            Err(err) => {
                let reason = err.to_string();
                self.absorb("health_check", Error::Redis(err));
                HealthReport::unhealthy(reason)
            }
        }
    }

    /// Graceful disconnect, falling back to a forced one.
    ///
    /// Attempts QUIT under the connect timeout; whether or not that
    /// succeeds, the managed connection is dropped and the gate goes
    /// down, so the process is never left holding an open handle.
    async fn close(&self) {
        let manager = {
            let mut guard = self.connection.write().expect(POISONED);
            self.initialized.store(false, Ordering::SeqCst);
            guard.take()
        };
        if let Some(mut con) = manager {
            let quit = redis::cmd("QUIT");
            match tokio::time::timeout(self.connect_timeout, quit.query_async::<()>(&mut con)).await
            {
                Ok(Ok(())) => debug!("redis connection closed"),
                Ok(Err(err)) => debug!(%err, "graceful disconnect failed, dropping connection"),
                Err(_) => debug!("graceful disconnect timed out, dropping connection"),
            }
        }
    }
}
