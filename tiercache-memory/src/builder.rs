//! Builder for configuring [`MemoryCache`].

use std::collections::HashMap;
use std::sync::Arc;

use smol_str::SmolStr;
use tiercache_core::{Clock, KeyBuilder, SystemClock};

use crate::backend::MemoryCache;

/// Builder for creating and configuring a [`MemoryCache`].
///
/// All options have defaults, so `MemoryCache::builder().build()` yields
/// a usable cache: 1000 entries, 100 MB soft ceiling, no default expiry,
/// sweep every 60 seconds.
///
/// # Examples
///
/// ```
/// use tiercache_memory::MemoryCache;
///
/// let cache = MemoryCache::builder()
///     .max_size(10_000)
///     .max_memory_mb(256)
///     .default_ttl(300)
///     .kind_ttl("static", 86_400)
///     .kind_ttl("volatile", 30)
///     .build();
/// ```
pub struct MemoryCacheBuilder {
    pub(crate) max_size: usize,
    pub(crate) max_memory_mb: usize,
    pub(crate) default_ttl: u64,
    pub(crate) check_interval: u64,
    pub(crate) key_prefix: SmolStr,
    pub(crate) kind_ttls: HashMap<SmolStr, u64>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl Default for MemoryCacheBuilder {
    fn default() -> Self {
        MemoryCacheBuilder {
            max_size: 1000,
            max_memory_mb: 100,
            default_ttl: 0,
            check_interval: 60,
            key_prefix: SmolStr::new_static("cache"),
            kind_ttls: HashMap::new(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl MemoryCacheBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum resident key count before LRU eviction kicks in.
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Soft memory ceiling in megabytes.
    ///
    /// Accounting is an estimate derived from serialized value length,
    /// not exact heap usage.
    pub fn max_memory_mb(mut self, megabytes: usize) -> Self {
        self.max_memory_mb = megabytes;
        self
    }

    /// Default TTL in seconds for entries written without an explicit
    /// TTL or a kind-specific default. `0` means no expiry by default.
    pub fn default_ttl(mut self, seconds: u64) -> Self {
        self.default_ttl = seconds;
        self
    }

    /// Seconds between periodic sweeps reclaiming expired entries.
    ///
    /// `0` disables the sweep; expired entries are then reclaimed only
    /// when touched.
    pub fn check_interval(mut self, seconds: u64) -> Self {
        self.check_interval = seconds;
        self
    }

    /// Prefix applied to every physical key.
    pub fn key_prefix(mut self, prefix: impl Into<SmolStr>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Default TTL in seconds for entries written with the given kind,
    /// overriding the cache-wide default. `0` means no expiry.
    pub fn kind_ttl(mut self, kind: impl Into<SmolStr>, seconds: u64) -> Self {
        self.kind_ttls.insert(kind.into(), seconds);
        self
    }

    /// Substitutes the wall clock, for tests that control time.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Creates the configured [`MemoryCache`].
    pub fn build(self) -> MemoryCache {
        let keys = KeyBuilder::new(self.key_prefix.clone());
        MemoryCache::from_builder(self, keys)
    }
}
