//! Engine configuration.

use std::time::Duration;

use rust_decimal::Decimal;

use walletcore_common::monetary;

use crate::retry::RetryPolicy;

/// Ledger engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Retry policy for transient lock contention.
    pub retry: RetryPolicy,
    /// Smallest accepted operation amount.
    pub min_amount: Decimal,
    /// Largest accepted operation amount.
    pub max_amount: Decimal,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            min_amount: monetary::min_amount(),
            max_amount: monetary::max_amount(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(attempts) = std::env::var("WALLETCORE_MAX_ATTEMPTS") {
            if let Ok(attempts) = attempts.parse() {
                config.retry.max_attempts = attempts;
            }
        }

        if let Ok(base_ms) = std::env::var("WALLETCORE_RETRY_BASE_MS") {
            if let Ok(base_ms) = base_ms.parse() {
                config.retry.base_delay = Duration::from_millis(base_ms);
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.retry.max_attempts == 0 {
            return Err("Retry attempts cannot be 0".to_string());
        }
        if self.retry.multiplier == 0 {
            return Err("Backoff multiplier cannot be 0".to_string());
        }
        if self.min_amount <= Decimal::ZERO {
            return Err("Minimum amount must be positive".to_string());
        }
        if self.min_amount > self.max_amount {
            return Err("Minimum amount cannot exceed maximum amount".to_string());
        }
        Ok(())
    }
}
