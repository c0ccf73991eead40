#![warn(missing_docs)]
//! # tiercache-memory
//!
//! In-process bounded cache backend.
//!
//! A hashed map with three independent eviction pressures:
//!
//! 1. **Count** - resident keys above `max_size` evict the least
//!    recently used entry;
//! 2. **Memory** - estimated resident bytes above `max_memory_mb` evict
//!    the least recently used entry regardless of its size;
//! 3. **TTL** - expired entries are observed as misses and reclaimed
//!    either passively on access or by a periodic sweep task.
//!
//! Recency is tracked with a monotonic access-order counter bumped on
//! every read and write, so LRU correctness never depends on map
//! iteration order.
//!
//! Data is not persisted and not shared across processes; loss on
//! restart is expected. Use `tiercache-redis` when entries must outlive
//! the process.

mod backend;
mod builder;
mod entry;

pub use backend::{MemoryCache, shared};
pub use builder::MemoryCacheBuilder;
pub use entry::CacheEntry;
