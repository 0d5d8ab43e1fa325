//! Per-player aggregate stats, derived from completed matches.
//!
//! Mutated only by the Settlement Engine immediately after a match reaches
//! `completed`, serialized per player through the registry's CAS discipline.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::PlayerId;

/// Aggregate record for one player on the leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub player: PlayerId,
    pub wins: u64,
    pub losses: u64,
    /// Sum of payouts received, after fees.
    pub total_winnings: Decimal,
    pub total_played: u64,
    pub last_played: DateTime<Utc>,
}

impl PlayerStats {
    /// Fresh record for a player with no history.
    #[must_use]
    pub fn new(player: PlayerId, now: DateTime<Utc>) -> Self {
        Self {
            player,
            wins: 0,
            losses: 0,
            total_winnings: Decimal::ZERO,
            total_played: 0,
            last_played: now,
        }
    }

    /// Record a won match and its payout.
    pub fn record_win(&mut self, payout: Decimal, now: DateTime<Utc>) {
        self.wins += 1;
        self.total_winnings += payout;
        self.total_played += 1;
        self.last_played = now;
    }

    /// Record a lost match.
    pub fn record_loss(&mut self, now: DateTime<Utc>) {
        self.losses += 1;
        self.total_played += 1;
        self.last_played = now;
    }
}
