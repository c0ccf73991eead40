//! Wall-clock abstraction.
//!
//! All TTL math and access-order stamping goes through [`Clock`] so the
//! backends never call the system time directly. Production code uses
//! [`SystemClock`]; tests substitute [`ManualClock`] to exercise expiry
//! without sleeping.

use chrono::Utc;

/// Epoch-millisecond time source.
pub trait Clock: Send + Sync {
    /// Current wall-clock time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// The default clock, backed by [`chrono::Utc`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A controllable clock for tests.
///
/// Starts at an arbitrary fixed point and only moves when told to.
#[cfg(feature = "test-helpers")]
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: std::sync::atomic::AtomicI64,
}

#[cfg(feature = "test-helpers")]
impl ManualClock {
    /// Creates a manual clock at the given epoch-millisecond instant.
    pub fn new(millis: i64) -> Self {
        ManualClock {
            millis: std::sync::atomic::AtomicI64::new(millis),
        }
    }

    /// Advances the clock by `delta` milliseconds.
    pub fn advance(&self, delta: i64) {
        self.millis
            .fetch_add(delta, std::sync::atomic::Ordering::SeqCst);
    }

    /// Sets the clock to an absolute epoch-millisecond instant.
    pub fn set(&self, millis: i64) {
        self.millis
            .store(millis, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(feature = "test-helpers")]
impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let a = clock.now_millis();
        let b = clock.now_millis();
        assert!(b >= a);
        // Sanity: past 2020-01-01.
        assert!(a > 1_577_836_800_000);
    }

    #[cfg(feature = "test-helpers")]
    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_millis(), 1_000);
        clock.advance(500);
        assert_eq!(clock.now_millis(), 1_500);
        clock.set(10_000);
        assert_eq!(clock.now_millis(), 10_000);
    }
}
