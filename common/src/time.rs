//! Time utilities and timing defaults for the ledger.

use chrono::{DateTime, Utc};

/// Timing defaults.
pub mod constants {
    use std::time::Duration;

    /// How long an operation waits for a wallet lock before failing as busy.
    pub fn lock_acquisition_timeout() -> Duration {
        Duration::from_secs(5)
    }

    /// Suggested client back-off after a busy failure.
    pub const BUSY_RETRY_AFTER_MS: u64 = 100;

    /// How long a successful result stays replayable by idempotency key.
    pub fn idempotency_window() -> Duration {
        Duration::from_secs(24 * 60 * 60)
    }
}

/// A timestamp (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Next commit timestamp: wall-clock time, but never earlier than `previous`.
pub fn monotonic_after(previous: Option<Timestamp>) -> Timestamp {
    let current = now();
    match previous {
        Some(prev) if prev > current => prev,
        _ => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_monotonic_after_clamps_backwards_clock() {
        let future = now() + Duration::seconds(10);
        assert_eq!(monotonic_after(Some(future)), future);

        let past = now() - Duration::seconds(10);
        assert!(monotonic_after(Some(past)) > past);
        assert!(monotonic_after(None) <= now());
    }
}
