//! Error types for the Redis backend.
//!
//! All errors can be converted to [`CacheError`] for uniform handling
//! across backends; they are absorbed at the operation boundary and
//! surface only through the stats counters.
//!
//! [`CacheError`]: tiercache_backend::CacheError

use redis::RedisError;
use tiercache_backend::CacheError;

/// Error type for Redis backend operations.
///
/// Wraps errors from the underlying [`redis`] crate: connection
/// failures, protocol errors, authentication failures and command
/// execution errors. You typically don't handle this directly; it
/// appears when [`RedisCacheBuilder::build`] is given an invalid
/// connection URL, and internally whenever a command fails.
///
/// [`RedisCacheBuilder::build`]: crate::RedisCacheBuilder::build
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An error from the underlying Redis client.
    #[error("redis backend error: {0}")]
    Redis(#[from] RedisError),
}

impl From<Error> for CacheError {
    fn from(error: Error) -> Self {
        CacheError::Connection(Box::new(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_error_converts_to_connection_error() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let error: CacheError = Error::Redis(RedisError::from(io)).into();
        assert!(matches!(error, CacheError::Connection(_)));
        assert!(error.to_string().contains("refused"));
    }
}
