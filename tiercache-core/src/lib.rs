#![warn(missing_docs)]
//! # tiercache-core
//!
//! Core types shared by every tiercache backend.
//!
//! The tiercache library exposes one uniform cache contract with two
//! backends behind it: an in-process bounded cache (`tiercache-memory`)
//! and a network-delegated cache (`tiercache-redis`). This crate holds
//! the leaf types both backends build on:
//!
//! - [`KeyBuilder`] - deterministic namespaced key construction
//! - [`pattern_matches`] - single-wildcard key pattern matching
//! - [`Clock`] - wall-clock abstraction so tests can control time
//! - [`Metrics`] / [`CacheStats`] - the shared counter set and its snapshot
//! - [`HealthReport`] - the derived health verdict
//!
//! The metrics and health shapes are deliberately identical across
//! backends so callers cannot tell which backend they are observing
//! except through latency.
//!
//! ## Feature Flags
//!
//! - `test-helpers` - Enable [`ManualClock`] for integration testing

pub mod clock;
pub mod health;
pub mod key;
pub mod metrics;
pub mod pattern;

#[cfg(feature = "test-helpers")]
pub use clock::ManualClock;
pub use clock::{Clock, SystemClock};
pub use health::{HealthReport, HealthStatus};
pub use key::KeyBuilder;
pub use metrics::{CacheStats, Metrics};
pub use pattern::pattern_matches;
