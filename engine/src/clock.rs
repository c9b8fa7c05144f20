//! Wall-clock abstraction.
//!
//! The engine never reads the system time itself. Every time-dependent
//! decision (cooldown eligibility, retry timestamps, id generation) takes a
//! [`Timestamp`] from a [`Clock`], so hosts can plug in the real clock and
//! tests can move time by hand.

use crate::Timestamp;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of the current time in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    /// Current time in epoch milliseconds.
    fn now_millis(&self) -> Timestamp;
}

/// A clock that only moves when told to.
///
/// Thread-safe, so it can be shared behind an `Arc` between a store under
/// test and the test body.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Create a clock frozen at `now`.
    pub fn new(now: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    /// Set the clock to an absolute time.
    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move the clock forward by `millis`.
    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}
