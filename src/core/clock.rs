//! Time sources for the cache.
//!
//! Every timestamp written to the store goes through [`StampIssuer`], which
//! guarantees that issued timestamps strictly increase within a process even
//! when the wall clock stalls or steps backwards.

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

/// A source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Used by tests that need deterministic activity windows.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Issues strictly increasing timestamps at microsecond precision.
pub(crate) struct StampIssuer {
    clock: Box<dyn Clock>,
    last_micros: Mutex<i64>,
}

impl StampIssuer {
    pub(crate) fn new(clock: Box<dyn Clock>) -> Self {
        Self {
            clock,
            last_micros: Mutex::new(i64::MIN),
        }
    }

    /// The clock's reading, without reserving a stamp
    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Record a timestamp already persisted so later stamps sort after it
    pub(crate) fn observe(&self, micros: i64) {
        let mut last = self.last_micros.lock().unwrap_or_else(|e| e.into_inner());
        *last = (*last).max(micros);
    }

    /// Reserve the next timestamp
    pub(crate) fn issue(&self) -> DateTime<Utc> {
        let mut last = self.last_micros.lock().unwrap_or_else(|e| e.into_inner());
        let candidate = to_micros(self.clock.now());
        let next = if candidate > *last {
            candidate
        } else {
            last.saturating_add(1)
        };
        *last = next;
        from_micros(next)
    }
}

/// Storage representation of a timestamp
pub(crate) fn to_micros(time: DateTime<Utc>) -> i64 {
    time.timestamp_micros()
}

pub(crate) fn from_micros(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or(DateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn stamps_strictly_increase_on_a_frozen_clock() {
        let start = Utc::now();
        let issuer = StampIssuer::new(Box::new(ManualClock::new(start)));

        let a = issuer.issue();
        let b = issuer.issue();
        let c = issuer.issue();

        assert!(a < b && b < c);
    }

    #[test]
    fn stamps_survive_a_clock_stepping_backwards() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let issuer = StampIssuer::new(Box::new(clock.clone()));

        let first = issuer.issue();
        clock.advance(Duration::hours(-1));
        let second = issuer.issue();

        assert!(second > first);
    }

    #[test]
    fn observed_stamps_are_respected() {
        let start = Utc::now();
        let issuer = StampIssuer::new(Box::new(ManualClock::new(start)));
        let future = to_micros(start + Duration::days(1));

        issuer.observe(future);

        assert!(to_micros(issuer.issue()) > future);
    }

    #[test]
    fn micros_roundtrip_preserves_precision() {
        let now = from_micros(to_micros(Utc::now()));
        assert_eq!(from_micros(to_micros(now)), now);
    }
}
