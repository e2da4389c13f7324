//! Clock abstraction for timestamps

use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

use crate::TimestampMs;

/// Source of "now" in milliseconds since the epoch.
pub trait Clock: Send + Sync + Debug {
    fn now_millis(&self) -> TimestampMs;
}

/// Wall clock backed by `chrono::Utc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> TimestampMs {
        Utc::now().timestamp_millis()
    }
}

/// Manually driven clock for tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: TimestampMs) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    pub fn set(&self, now: TimestampMs) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: i64) -> TimestampMs {
        self.now.fetch_add(millis, Ordering::SeqCst) + millis
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> TimestampMs {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_millis(), 1_000);
        assert_eq!(clock.advance(250), 1_250);
        clock.set(5);
        assert_eq!(clock.now_millis(), 5);
    }

    #[test]
    fn test_system_clock_is_after_2020() {
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }
}
