//! Fee math over the two-stake pot.
//!
//! Fees are percentages expressed in basis points and deducted from the pot
//! (twice the per-player wager) at settlement. The fixed network-cost
//! buffer is a separate escrow requirement handled by the engine; it never
//! enters the percentage math here.

use rust_decimal::Decimal;
use stakematch_types::{constants, Result, SettlementConfig, StakematchError};

/// Validated platform and referral fee rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSchedule {
    platform_bps: u32,
    referral_bps: u32,
}

impl FeeSchedule {
    /// Build a schedule, enforcing the per-fee caps.
    ///
    /// # Errors
    /// Returns `Configuration` when either rate exceeds its cap.
    pub fn new(platform_bps: u32, referral_bps: u32) -> Result<Self> {
        if platform_bps > constants::MAX_PLATFORM_FEE_BPS {
            return Err(StakematchError::Configuration(format!(
                "platform fee {platform_bps} bps exceeds cap {}",
                constants::MAX_PLATFORM_FEE_BPS
            )));
        }
        if referral_bps > constants::MAX_REFERRAL_FEE_BPS {
            return Err(StakematchError::Configuration(format!(
                "referral fee {referral_bps} bps exceeds cap {}",
                constants::MAX_REFERRAL_FEE_BPS
            )));
        }
        Ok(Self {
            platform_bps,
            referral_bps,
        })
    }

    /// Schedule from a validated settlement config.
    pub fn from_config(config: &SettlementConfig) -> Result<Self> {
        Self::new(config.platform_fee_bps, config.referral_fee_bps)
    }

    #[must_use]
    pub fn platform_bps(&self) -> u32 {
        self.platform_bps
    }

    #[must_use]
    pub fn referral_bps(&self) -> u32 {
        self.referral_bps
    }

    /// Combined rate applied to the pot.
    #[must_use]
    pub fn total_bps(&self) -> u32 {
        self.platform_bps + self.referral_bps
    }

    /// The pot for a given per-player stake.
    #[must_use]
    pub fn pot(wager: Decimal) -> Decimal {
        wager * Decimal::TWO
    }

    /// Total fee withheld from the pot.
    #[must_use]
    pub fn fee_amount(&self, wager: Decimal) -> Decimal {
        Self::pot(wager) * Decimal::from(self.total_bps())
            / Decimal::from(constants::BPS_DENOMINATOR)
    }

    /// Winner payout: the pot less the combined fee.
    #[must_use]
    pub fn payout(&self, wager: Decimal) -> Decimal {
        Self::pot(wager) - self.fee_amount(wager)
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            platform_bps: constants::DEFAULT_PLATFORM_FEE_BPS,
            referral_bps: constants::DEFAULT_REFERRAL_FEE_BPS,
        }
    }
}
