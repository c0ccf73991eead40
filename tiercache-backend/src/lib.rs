#![warn(missing_docs)]
//! # tiercache-backend
//!
//! The uniform cache contract: one [`Cache`] trait implemented by the
//! in-process backend (`tiercache-memory`) and the remote backend
//! (`tiercache-redis`), so callers can swap backends without code
//! changes.
//!
//! Every externally-triggered failure (network, serialization) is
//! absorbed at the backend boundary: operations return their
//! "unavailable" value (fallback for reads, `false` for mutations) and
//! the failure is visible only through the stats counters. A cache
//! outage degrades callers to "always miss" instead of cascading
//! upward.

mod cache;
pub mod codec;
mod options;

use thiserror::Error;

pub use cache::{Cache, TTL_MISSING, TTL_NO_EXPIRY};
pub use options::{GetOptions, IncrOptions, SetOptions};

/// Errors absorbed at the backend boundary.
///
/// These never cross the [`Cache`] contract; backends catch them,
/// count them, and convert them into the operation's unavailable
/// return value.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Network interaction error while talking to a remote service.
    #[error(transparent)]
    Connection(Box<dyn std::error::Error + Send + Sync>),

    /// A bounded operation did not complete in time.
    #[error("operation timed out")]
    Timeout,

    /// A stored value could not be encoded or decoded.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}
