//! Key pattern matching for bulk operations.
//!
//! Patterns support a single `*` wildcard translated to a prefix or
//! prefix+suffix match. There is deliberately no regex engine and no
//! multi-wildcard support: the only consumers are `del_pattern` and
//! namespace flushes, which use trailing-`*` patterns.

/// Matches a key against a pattern with at most one `*` wildcard.
///
/// - no `*`: exact equality
/// - trailing `*`: prefix match
/// - embedded `*`: prefix + suffix match
///
/// Only the first `*` is interpreted; any further `*` characters are
/// matched literally as part of the suffix.
///
/// ```
/// use tiercache_core::pattern_matches;
///
/// assert!(pattern_matches("sessions:*", "sessions:42"));
/// assert!(pattern_matches("user:*:profile", "user:42:profile"));
/// assert!(!pattern_matches("sessions:*", "events:42"));
/// ```
pub fn pattern_matches(pattern: &str, key: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == key,
        Some((prefix, suffix)) => {
            key.len() >= prefix.len() + suffix.len()
                && key.starts_with(prefix)
                && key.ends_with(suffix)
        }
    }
}
