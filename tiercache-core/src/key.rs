//! Cache key construction.
//!
//! Both backends build physical keys the same way: a fixed instance
//! prefix, an optional namespace, and the caller's logical key joined
//! with `:` separators. Two callers using different namespaces can never
//! collide, and a namespace can be flushed in bulk without touching
//! unrelated keys.
//!
//! ```
//! use tiercache_core::KeyBuilder;
//!
//! let keys = KeyBuilder::new("cache");
//! assert_eq!(keys.build("user:42", None), "cache:user:42");
//! assert_eq!(keys.build("user:42", Some("sessions")), "cache:sessions:user:42");
//! ```

use smol_str::SmolStr;

/// Deterministic key builder shared by all backends.
///
/// The builder is cheap to clone; the prefix uses [`SmolStr`] so typical
/// short prefixes stay inline without heap allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBuilder {
    prefix: SmolStr,
}

impl KeyBuilder {
    /// Creates a key builder with the given instance prefix.
    pub fn new(prefix: impl Into<SmolStr>) -> Self {
        KeyBuilder {
            prefix: prefix.into(),
        }
    }

    /// Returns the instance prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Builds the physical key for a logical key and optional namespace.
    ///
    /// Format: `{prefix}:{namespace}:{key}`, with the namespace segment
    /// omitted entirely when no namespace is given.
    pub fn build(&self, key: &str, namespace: Option<&str>) -> String {
        match namespace {
            Some(ns) => format!("{}:{}:{}", self.prefix, ns, key),
            None => format!("{}:{}", self.prefix, key),
        }
    }

    /// Maps a logical key pattern onto the physical keyspace.
    pub fn scoped(&self, pattern: &str) -> String {
        format!("{}:{}", self.prefix, pattern)
    }

    /// The logical pattern matching every key in a namespace.
    pub fn namespace_pattern(namespace: &str) -> String {
        format!("{}:*", namespace)
    }

    /// Strips the instance prefix from a physical key.
    ///
    /// Returns `None` for keys that do not belong to this instance.
    pub fn strip<'a>(&self, full_key: &'a str) -> Option<&'a str> {
        full_key
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix(':'))
    }
}

impl Default for KeyBuilder {
    fn default() -> Self {
        KeyBuilder {
            prefix: SmolStr::new_static("cache"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_without_namespace() {
        let keys = KeyBuilder::new("cache");
        assert_eq!(keys.build("k", None), "cache:k");
    }

    #[test]
    fn test_build_with_namespace() {
        let keys = KeyBuilder::new("cache");
        assert_eq!(keys.build("k", Some("ns1")), "cache:ns1:k");
    }

    #[test]
    fn test_distinct_namespaces_never_collide() {
        let keys = KeyBuilder::new("cache");
        assert_ne!(keys.build("k", None), keys.build("k", Some("ns1")));
        assert_ne!(keys.build("k", Some("a")), keys.build("k", Some("b")));
    }

    #[test]
    fn test_strip_roundtrip() {
        let keys = KeyBuilder::new("cache");
        let full = keys.build("user:42", Some("sessions"));
        assert_eq!(keys.strip(&full), Some("sessions:user:42"));
    }

    #[test]
    fn test_strip_foreign_prefix() {
        let keys = KeyBuilder::new("cache");
        assert_eq!(keys.strip("other:k"), None);
        assert_eq!(keys.strip("cache"), None);
    }

    #[test]
    fn test_namespace_pattern() {
        assert_eq!(KeyBuilder::namespace_pattern("ns1"), "ns1:*");
    }

    #[test]
    fn test_scoped_pattern() {
        let keys = KeyBuilder::new("cache");
        assert_eq!(keys.scoped("ns1:*"), "cache:ns1:*");
    }
}
