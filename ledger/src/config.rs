//! Ledger configuration.

use std::time::Duration;

use borderless_common::constants;

/// Wallet lock configuration.
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Longest an operation waits for its wallet locks.
    pub acquisition_timeout: Duration,
    /// Back-off hint returned with busy failures.
    pub busy_retry_after_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            acquisition_timeout: constants::lock_acquisition_timeout(),
            busy_retry_after_ms: constants::BUSY_RETRY_AFTER_MS,
        }
    }
}

/// Idempotency window configuration.
#[derive(Debug, Clone)]
pub struct IdempotencyConfig {
    /// How long a successful result can be replayed.
    pub window: Duration,
    /// Entry count that triggers eviction of expired results.
    pub max_entries: usize,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            window: constants::idempotency_window(),
            max_entries: 100_000,
        }
    }
}

/// Main ledger configuration.
#[derive(Debug, Clone, Default)]
pub struct LedgerConfig {
    /// Lock configuration.
    pub lock: LockConfig,
    /// Idempotency configuration.
    pub idempotency: IdempotencyConfig,
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(ms) = std::env::var("LEDGER_LOCK_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                config.lock.acquisition_timeout = Duration::from_millis(ms);
            }
        }

        if let Ok(secs) = std::env::var("LEDGER_IDEMPOTENCY_WINDOW_SECS") {
            if let Ok(secs) = secs.parse() {
                config.idempotency.window = Duration::from_secs(secs);
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.lock.acquisition_timeout.is_zero() {
            return Err("Lock acquisition timeout cannot be 0".to_string());
        }

        if self.idempotency.window.is_zero() {
            return Err("Idempotency window cannot be 0".to_string());
        }

        if self.idempotency.max_entries == 0 {
            return Err("Idempotency max entries cannot be 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lock.acquisition_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_config() {
        let mut config = LedgerConfig::default();
        config.lock.acquisition_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
