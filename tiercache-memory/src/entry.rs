//! The per-key record stored by the in-process backend.

use std::mem::size_of;

use serde_json::Value;
use smol_str::SmolStr;
use tiercache_backend::codec;

/// A resident cache entry: the caller's payload plus the metadata the
/// eviction machinery needs.
///
/// Invariant: `expires_at` is either `None` ("no expiry") or strictly
/// greater than `created_at`. An entry whose `expires_at` has passed is
/// logically absent even while physically resident; readers observe a
/// miss and the next sweep reclaims it.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The caller's payload in wire-safe form.
    pub value: Value,
    /// Insertion time, epoch milliseconds.
    pub created_at: i64,
    /// Expiry instant, epoch milliseconds. `None` means no expiry.
    pub expires_at: Option<i64>,
    /// Optional classification used only to pick a default TTL policy.
    pub kind: Option<SmolStr>,
    /// Estimated byte footprint, fixed at insertion time.
    pub memory_size: usize,
    /// Logical recency stamp; smaller means evicted first under
    /// count-based pressure.
    pub access_order: u64,
}

impl CacheEntry {
    /// Creates an entry, measuring its memory footprint from the
    /// serialized value length plus fixed overhead.
    ///
    /// `ttl_millis` of `None` means the entry never expires.
    pub fn new(
        value: Value,
        created_at: i64,
        ttl_millis: Option<i64>,
        kind: Option<SmolStr>,
        key_len: usize,
        access_order: u64,
    ) -> Self {
        let memory_size = Self::estimate_size(&value, key_len);
        CacheEntry {
            value,
            created_at,
            expires_at: ttl_millis.map(|ttl| created_at + ttl.max(1)),
            kind,
            memory_size,
            access_order,
        }
    }

    /// True when the entry's expiry has passed.
    pub fn is_expired(&self, now_millis: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now_millis,
            None => false,
        }
    }

    /// Remaining lifetime in whole seconds, `None` when no expiry is set.
    pub fn remaining_secs(&self, now_millis: i64) -> Option<i64> {
        self.expires_at.map(|expires_at| {
            let remaining = expires_at - now_millis;
            if remaining <= 0 { 0 } else { remaining / 1000 }
        })
    }

    /// Estimated byte footprint of an entry holding `value` under a key
    /// of `key_len` bytes.
    ///
    /// This is the serialized length plus struct and key overhead, an
    /// estimate for the soft memory ceiling rather than exact heap
    /// usage.
    pub fn estimate_size(value: &Value, key_len: usize) -> usize {
        size_of::<Self>() + key_len + codec::encoded_len(value)
    }

    /// Replaces the payload in place, re-measuring the footprint.
    ///
    /// Returns the change in estimated bytes (new minus old) so the
    /// owner can keep its running total accurate.
    pub fn replace_value(&mut self, value: Value, key_len: usize) -> isize {
        let new_size = Self::estimate_size(&value, key_len);
        let delta = new_size as isize - self.memory_size as isize;
        self.value = value;
        self.memory_size = new_size;
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expiry_invariant() {
        let entry = CacheEntry::new(json!("v"), 1_000, Some(5_000), None, 3, 1);
        assert_eq!(entry.expires_at, Some(6_000));
        assert!(entry.expires_at.unwrap() > entry.created_at);

        let forever = CacheEntry::new(json!("v"), 1_000, None, None, 3, 1);
        assert_eq!(forever.expires_at, None);
    }

    #[test]
    fn test_is_expired_boundary() {
        let entry = CacheEntry::new(json!("v"), 0, Some(1_000), None, 3, 1);
        assert!(!entry.is_expired(999));
        // An entry at exactly its expiry instant is logically absent.
        assert!(entry.is_expired(1_000));
        assert!(entry.is_expired(2_000));
    }

    #[test]
    fn test_remaining_secs_floors() {
        let entry = CacheEntry::new(json!("v"), 0, Some(2_500), None, 3, 1);
        assert_eq!(entry.remaining_secs(0), Some(2));
        assert_eq!(entry.remaining_secs(1_600), Some(0));
        assert_eq!(entry.remaining_secs(3_000), Some(0));

        let forever = CacheEntry::new(json!("v"), 0, None, None, 3, 1);
        assert_eq!(forever.remaining_secs(0), None);
    }

    #[test]
    fn test_size_grows_with_payload() {
        let small = CacheEntry::estimate_size(&json!("x"), 5);
        let large = CacheEntry::estimate_size(&json!("x".repeat(1024)), 5);
        assert!(large > small + 1000);
    }

    #[test]
    fn test_replace_value_reports_delta() {
        let mut entry = CacheEntry::new(json!("short"), 0, None, None, 3, 1);
        let before = entry.memory_size;
        let delta = entry.replace_value(json!("a much longer payload than before"), 3);
        assert!(delta > 0);
        assert_eq!(entry.memory_size as isize, before as isize + delta);
    }
}
