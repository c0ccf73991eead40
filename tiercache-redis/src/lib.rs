#![warn(missing_docs)]
//! # tiercache-redis
//!
//! Remote cache backend over a networked Redis service.
//!
//! Replays the uniform cache contract using remote primitives: string
//! get/set with expiry, set-if-absent, atomic increment, pipelined
//! multi-get/multi-set and cursor-based key scanning.
//!
//! The backend is built around one resilience property: when the
//! connection is down it degrades to "always miss" instead of blocking
//! or throwing. Every operation checks the availability gate first and
//! short-circuits to its unavailable return value; transport and
//! deserialization failures inside an operation are absorbed, counted
//! in the stats and converted the same way.

mod backend;
mod error;

pub use backend::{RedisCache, RedisCacheBuilder};
pub use error::Error;
