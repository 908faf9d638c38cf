//! Time sources for the cache
//!
//! The store asks a `Clock` for "now" instead of reading the system clock
//! directly, so expiry can be driven deterministically in tests.

use chrono::{DateTime, Duration, Local};
use std::sync::{Arc, Mutex};

/// Source of the current local time
pub trait Clock {
    /// Returns the current time
    fn now(&self) -> DateTime<Local>;
}

/// Clock backed by the system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Manually advanced clock
///
/// Clones share the same underlying instant, so a test can keep one handle
/// and advance the time seen by a store that owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Local>>>,
}

impl ManualClock {
    /// Creates a clock frozen at the given instant
    pub fn at(start: DateTime<Local>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Moves the clock forward (or backward, for negative durations)
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }

    /// Jumps the clock to an exact instant
    pub fn set(&self, to: DateTime<Local>) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at(Local::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
