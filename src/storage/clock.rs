//! Clock Sources
//!
//! Records are stamped with wall-clock time so callers can query by real
//! timestamps. The clock is injected so tests can drive time by hand.

use std::sync::Mutex;
use std::time::{Duration, SystemTime};

/// A point in wall-clock time.
pub type Timestamp = SystemTime;

/// Abstraction over the system clock for dependency injection.
///
/// The default implementation ([`SystemClock`]) delegates to `SystemTime::now()`.
pub trait ClockSource: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

/// Clock source that reads the real system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    #[inline]
    fn now(&self) -> Timestamp {
        SystemTime::now()
    }
}

/// A clock that only moves when told to.
///
/// # Example
///
/// ```
/// use chronokv::storage::{ClockSource, ManualClock};
/// use std::time::{Duration, SystemTime};
///
/// let clock = ManualClock::new(SystemTime::UNIX_EPOCH);
/// clock.advance(Duration::from_secs(5));
/// assert_eq!(clock.now(), SystemTime::UNIX_EPOCH + Duration::from_secs(5));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    /// Jumps the clock to `to`, which may be in the past.
    pub fn set(&self, to: Timestamp) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(SystemTime::now())
    }
}

impl ClockSource for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
