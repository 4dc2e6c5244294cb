//! Time source abstraction.
//!
//! Every window computed by the guard services (rate-limit windows, the one-hour
//! attempt window, IP block expiry) reads time through [`Clock`], so tests can
//! drive those windows with a [`ManualClock`] instead of sleeping.

use chrono::{DateTime, Utc};

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(any(test, feature = "test-util"))]
pub use manual::ManualClock;

#[cfg(any(test, feature = "test-util"))]
mod manual {
    use std::sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    };

    use chrono::{DateTime, Duration, Utc};

    use super::Clock;

    /// A clock that only moves when told to.
    ///
    /// Clones share the same underlying instant, so a test can keep one handle
    /// and hand another to the service under test.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use chrono::Duration;
    /// use vigil_core::clock::{Clock, ManualClock};
    ///
    /// let clock = ManualClock::epoch();
    /// let start = clock.now();
    /// clock.advance(Duration::minutes(15));
    /// assert_eq!(clock.now() - start, Duration::minutes(15));
    /// ```
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        millis: Arc<AtomicI64>,
    }

    impl ManualClock {
        pub fn new(start: DateTime<Utc>) -> Self {
            Self {
                millis: Arc::new(AtomicI64::new(start.timestamp_millis())),
            }
        }

        /// A clock parked at 2025-01-01T00:00:00Z.
        pub fn epoch() -> Self {
            Self {
                millis: Arc::new(AtomicI64::new(1_735_689_600_000)),
            }
        }

        pub fn set(&self, instant: DateTime<Utc>) {
            self.millis
                .store(instant.timestamp_millis(), Ordering::SeqCst);
        }

        pub fn advance(&self, by: Duration) {
            self.millis
                .fetch_add(by.num_milliseconds(), Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_manual_clock_is_shared_between_clones() {
        let clock = ManualClock::epoch();
        let handle = clock.clone();
        let start = clock.now();

        handle.advance(Duration::seconds(61));

        assert_eq!(clock.now() - start, Duration::seconds(61));
    }

    #[test]
    fn test_manual_clock_set() {
        let clock = ManualClock::epoch();
        let target = DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        clock.set(target);
        assert_eq!(clock.now(), target);
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
