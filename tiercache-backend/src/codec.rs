//! Wire codec for cached payloads.
//!
//! Payloads are [`serde_json::Value`]: a structural, transport-safe form
//! with dates normalized to strings and no host-language artifacts. The
//! remote backend stores the encoded string verbatim; the in-process
//! backend uses the encoded length as its memory-footprint estimate, so
//! both backends account for values the same way.

use serde_json::Value;

use crate::CacheError;

/// Encodes a payload to its transport string.
pub fn encode(value: &Value) -> Result<String, CacheError> {
    serde_json::to_string(value).map_err(CacheError::from)
}

/// Decodes a transport string back into a payload.
///
/// A failure here means the stored value is malformed; backends treat
/// that as a miss for the affected key, never as a batch failure.
pub fn decode(raw: &str) -> Result<Value, CacheError> {
    serde_json::from_str(raw).map_err(CacheError::from)
}

/// Serialized length in bytes of a payload's transport form.
///
/// Used by the in-process backend for memory accounting. Values that
/// cannot be encoded are counted as zero-length; the subsequent `set`
/// will surface the same failure.
pub fn encoded_len(value: &Value) -> usize {
    serde_json::to_string(value).map(|s| s.len()).unwrap_or(0)
}
