//! Configuration types for the matchmaking and settlement components.
//!
//! Plain serde structs with validated constructors. Loading them from the
//! environment or a file is the embedding service's concern, not the core's.

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{constants, Result, StakematchError};

/// Tuning for the registry, queue, and sweeper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchmakingConfig {
    /// Smallest accepted per-player stake.
    pub min_wager: Decimal,
    /// Largest accepted per-player stake.
    pub max_wager: Decimal,
    /// Join deadline for a created match, in milliseconds.
    pub match_ttl_ms: u64,
    /// Deadline for a queued request, in milliseconds.
    pub request_ttl_ms: u64,
    /// Failsafe expiry of the sweep lock, in milliseconds.
    pub sweep_lock_ttl_ms: u64,
}

impl Default for MatchmakingConfig {
    fn default() -> Self {
        Self {
            min_wager: Decimal::new(1, 3),  // 0.001
            max_wager: Decimal::new(100, 0),
            match_ttl_ms: constants::DEFAULT_MATCH_TTL_MS,
            request_ttl_ms: constants::DEFAULT_REQUEST_TTL_MS,
            sweep_lock_ttl_ms: constants::DEFAULT_SWEEP_LOCK_TTL_MS,
        }
    }
}

impl MatchmakingConfig {
    /// Check internal consistency.
    ///
    /// # Errors
    /// Returns `Configuration` when the wager bounds are unusable.
    pub fn validate(&self) -> Result<()> {
        if self.min_wager <= Decimal::ZERO {
            return Err(StakematchError::Configuration(
                "min_wager must be positive".to_string(),
            ));
        }
        if self.max_wager < self.min_wager {
            return Err(StakematchError::Configuration(
                "max_wager must be >= min_wager".to_string(),
            ));
        }
        Ok(())
    }

    /// Check a wager against the configured bounds.
    ///
    /// # Errors
    /// Returns `InvalidWager` for non-positive or out-of-bounds amounts.
    pub fn check_wager(&self, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(StakematchError::InvalidWager {
                amount,
                reason: "wager must be positive".to_string(),
            });
        }
        if amount < self.min_wager || amount > self.max_wager {
            return Err(StakematchError::InvalidWager {
                amount,
                reason: format!(
                    "wager outside bounds [{}, {}]",
                    self.min_wager, self.max_wager
                ),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn match_ttl(&self) -> Duration {
        Duration::milliseconds(i64::try_from(self.match_ttl_ms).unwrap_or(i64::MAX))
    }

    #[must_use]
    pub fn request_ttl(&self) -> Duration {
        Duration::milliseconds(i64::try_from(self.request_ttl_ms).unwrap_or(i64::MAX))
    }

    #[must_use]
    pub fn sweep_lock_ttl(&self) -> Duration {
        Duration::milliseconds(i64::try_from(self.sweep_lock_ttl_ms).unwrap_or(i64::MAX))
    }
}

/// Tuning for the settlement engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Platform fee in basis points, capped at
    /// [`constants::MAX_PLATFORM_FEE_BPS`].
    pub platform_fee_bps: u32,
    /// Referral fee in basis points, capped independently at
    /// [`constants::MAX_REFERRAL_FEE_BPS`].
    pub referral_fee_bps: u32,
    /// Fixed buffer kept in escrow for the network transfer cost. Covers
    /// network cost only — it is not part of the percentage fee math.
    pub fee_buffer: Decimal,
    /// Attempts at acquiring a fresh transfer handle.
    pub handle_retries: u32,
    /// Base backoff between handle attempts; doubles per attempt.
    pub retry_backoff_ms: u64,
    /// Hard timeout for the confirmation poll.
    pub confirm_timeout_ms: u64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            platform_fee_bps: constants::DEFAULT_PLATFORM_FEE_BPS,
            referral_fee_bps: constants::DEFAULT_REFERRAL_FEE_BPS,
            fee_buffer: Decimal::new(5, 6), // 0.000005, ~5000 lamports
            handle_retries: constants::DEFAULT_HANDLE_RETRIES,
            retry_backoff_ms: constants::DEFAULT_RETRY_BACKOFF_MS,
            confirm_timeout_ms: constants::DEFAULT_CONFIRM_TIMEOUT_MS,
        }
    }
}

impl SettlementConfig {
    /// Check fee caps and buffer sanity.
    ///
    /// # Errors
    /// Returns `Configuration` when either fee exceeds its cap or the
    /// buffer is negative.
    pub fn validate(&self) -> Result<()> {
        if self.platform_fee_bps > constants::MAX_PLATFORM_FEE_BPS {
            return Err(StakematchError::Configuration(format!(
                "platform fee {} bps exceeds cap {}",
                self.platform_fee_bps,
                constants::MAX_PLATFORM_FEE_BPS
            )));
        }
        if self.referral_fee_bps > constants::MAX_REFERRAL_FEE_BPS {
            return Err(StakematchError::Configuration(format!(
                "referral fee {} bps exceeds cap {}",
                self.referral_fee_bps,
                constants::MAX_REFERRAL_FEE_BPS
            )));
        }
        if self.fee_buffer < Decimal::ZERO {
            return Err(StakematchError::Configuration(
                "fee_buffer must be non-negative".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn confirm_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.confirm_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        MatchmakingConfig::default().validate().unwrap();
        SettlementConfig::default().validate().unwrap();
    }

    #[test]
    fn wager_bounds_enforced() {
        let cfg = MatchmakingConfig::default();
        assert!(cfg.check_wager(Decimal::ONE).is_ok());
        assert!(cfg.check_wager(Decimal::ZERO).is_err());
        assert!(cfg.check_wager(Decimal::new(-1, 0)).is_err());
        assert!(cfg.check_wager(Decimal::new(1, 4)).is_err()); // below min
        assert!(cfg.check_wager(Decimal::new(101, 0)).is_err()); // above max
    }

    #[test]
    fn platform_fee_cap_enforced() {
        let cfg = SettlementConfig {
            platform_fee_bps: constants::MAX_PLATFORM_FEE_BPS + 1,
            ..SettlementConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, StakematchError::Configuration(_)));
    }

    #[test]
    fn referral_fee_cap_independent() {
        // Referral fee above its own cap fails even though it would fit
        // under the platform cap.
        let cfg = SettlementConfig {
            referral_fee_bps: constants::MAX_REFERRAL_FEE_BPS + 1,
            ..SettlementConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn inverted_wager_bounds_rejected() {
        let cfg = MatchmakingConfig {
            min_wager: Decimal::new(10, 0),
            max_wager: Decimal::ONE,
            ..MatchmakingConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn ttl_helpers_convert_ms() {
        let cfg = MatchmakingConfig::default();
        assert_eq!(cfg.request_ttl(), Duration::minutes(2));
        assert_eq!(cfg.match_ttl(), Duration::minutes(10));
    }

    #[test]
    fn config_serde_roundtrip() {
        let cfg = SettlementConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: SettlementConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.platform_fee_bps, back.platform_fee_bps);
        assert_eq!(cfg.fee_buffer, back.fee_buffer);
    }
}
