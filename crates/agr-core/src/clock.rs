//! # Clocks
//!
//! The engine observes "now" once per entry point through a [`Clock`].
//! Production wiring uses [`SystemClock`]; tests and scenario replays use
//! [`MockClock`] to land exactly on deadline boundaries.

use parking_lot::Mutex;

use crate::error::CoreError;
use crate::temporal::Timestamp;

/// Source of the current time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// The current instant, truncated to whole seconds.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A manually driven clock.
#[derive(Debug)]
pub struct MockClock {
    now: Mutex<Timestamp>,
}

impl MockClock {
    /// A clock frozen at `start` until advanced.
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward by `secs` seconds.
    pub fn advance_secs(&self, secs: u64) -> Result<Timestamp, CoreError> {
        let mut now = self.now.lock();
        *now = now.plus_secs(secs)?;
        Ok(*now)
    }

    /// Jump to an absolute instant. Moving backwards is allowed.
    pub fn set(&self, at: Timestamp) {
        *self.now.lock() = at;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new(Timestamp::now())
    }
}

impl Clock for MockClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}
