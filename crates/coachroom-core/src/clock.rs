//! Injected time source.
//!
//! All cooldown arithmetic reads the wall clock through [`Clock`] so tests can
//! pin time, and every engine operation reads `now` exactly once.

use chrono::{DateTime, FixedOffset, Local, Utc};
use std::sync::Mutex;

/// Source of the current local wall time.
pub trait Clock: Send + Sync {
    /// Current instant, carrying the local UTC offset used for calendar-day
    /// and hour-of-day decisions.
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Clock backed by the operating system's local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl FixedClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Pin the clock to a UTC instant (offset +00:00).
    pub fn at_utc(now: DateTime<Utc>) -> Self {
        Self::new(now.fixed_offset())
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
