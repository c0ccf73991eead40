//! Per-operation options.
//!
//! Each operation takes an explicit, fully enumerated options struct so
//! every recognized option and its effect is compile-time visible. All
//! structs default to "no namespace, no overrides" and offer
//! builder-style `with_*` helpers.

use serde_json::Value;
use smol_str::SmolStr;

/// Options for [`Cache::get`](crate::Cache::get).
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    /// Namespace to resolve the key in.
    pub namespace: Option<SmolStr>,
    /// Value returned on a miss instead of `None`.
    pub fallback: Option<Value>,
}

impl GetOptions {
    /// Scopes the lookup to a namespace.
    pub fn with_namespace(mut self, namespace: impl Into<SmolStr>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Value to hand back when the key is absent or expired.
    pub fn with_fallback(mut self, fallback: Value) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

/// Options for [`Cache::set`](crate::Cache::set) and
/// [`Cache::mset`](crate::Cache::mset).
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// Time-to-live in seconds.
    ///
    /// `Some(0)` means "never expire". `None` falls back to the entry
    /// kind's configured default, then to the cache-wide default.
    pub ttl: Option<u64>,
    /// Entry classification used only to pick a default TTL policy
    /// (for example "static" vs "volatile" content).
    pub kind: Option<SmolStr>,
    /// Namespace to store the key under.
    pub namespace: Option<SmolStr>,
    /// Only write if the key has no live value (not-exists flag).
    pub nx: bool,
}

impl SetOptions {
    /// Explicit TTL in seconds; `0` means never expire.
    pub fn with_ttl(mut self, seconds: u64) -> Self {
        self.ttl = Some(seconds);
        self
    }

    /// Entry kind for TTL policy selection.
    pub fn with_kind(mut self, kind: impl Into<SmolStr>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Scopes the write to a namespace.
    pub fn with_namespace(mut self, namespace: impl Into<SmolStr>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Only write when no live value exists.
    pub fn with_nx(mut self) -> Self {
        self.nx = true;
        self
    }
}

/// Options for [`Cache::incr`](crate::Cache::incr).
#[derive(Debug, Clone)]
pub struct IncrOptions {
    /// Signed delta to apply; negative values decrement.
    pub amount: i64,
    /// TTL in seconds, applied only when the counter is first created.
    pub ttl: Option<u64>,
    /// Namespace to resolve the counter in.
    pub namespace: Option<SmolStr>,
}

impl Default for IncrOptions {
    fn default() -> Self {
        IncrOptions {
            amount: 1,
            ttl: None,
            namespace: None,
        }
    }
}

impl IncrOptions {
    /// Delta to apply instead of the default `1`.
    pub fn with_amount(mut self, amount: i64) -> Self {
        self.amount = amount;
        self
    }

    /// TTL in seconds for a freshly created counter.
    pub fn with_ttl(mut self, seconds: u64) -> Self {
        self.ttl = Some(seconds);
        self
    }

    /// Scopes the counter to a namespace.
    pub fn with_namespace(mut self, namespace: impl Into<SmolStr>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}
