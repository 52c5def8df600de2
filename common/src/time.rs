//! Time utilities and timing constants for the walletcore ledger.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Default timing constants consumed by the store and engine configs.
pub mod constants {
    use super::Duration;

    /// How long a unit of work waits for an exclusive row lock (5 seconds).
    pub fn default_lock_wait_timeout() -> Duration {
        Duration::from_secs(5)
    }

    /// Base delay before the first retry of a contended operation (100 ms).
    pub fn retry_base_delay() -> Duration {
        Duration::from_millis(100)
    }

    /// Delay multiplier applied after each failed attempt.
    pub const RETRY_BACKOFF_MULTIPLIER: u32 = 2;

    /// Attempts per top-level operation before surfacing a conflict.
    pub const MAX_RETRY_ATTEMPTS: u32 = 3;
}

/// A timestamp with timezone (always UTC for walletcore).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}
