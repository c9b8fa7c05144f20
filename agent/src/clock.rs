//! System wall clock.

use sitesync_engine::{Clock, Timestamp};

/// Reads the current UTC time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> Timestamp {
        chrono::Utc::now().timestamp_millis().max(0) as Timestamp
    }
}
