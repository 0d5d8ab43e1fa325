//! Key-naming scheme for the Ledger Store.
//!
//! Single source of truth so the registry, queue, sweeper, and settlement
//! engine never disagree about where an entity lives. Wager-tier keys use
//! the normalized decimal rendering so `1.0` and `1.00` land in the same
//! tier.

use rust_decimal::Decimal;
use stakematch_types::{MatchId, PlayerId, RequestId};

/// Prefix for match records.
pub const MATCH_PREFIX: &str = "match:";
/// Prefix for matchmaking request records.
pub const REQUEST_PREFIX: &str = "matchrequest:";
/// Sorted set of wager tiers that currently have (or had) a queue.
pub const AMOUNTS_KEY: &str = "matchmaking:amounts";
/// Sorted set of pending matches scored by their join deadline (ms).
pub const PENDING_MATCHES_KEY: &str = "matches:pending";
/// The sweep mutual-exclusion lock.
pub const SWEEP_LOCK_KEY: &str = "matchmaking:cleanup_lock";
/// Bookkeeping record of the last completed sweep.
pub const LAST_SWEEP_KEY: &str = "matchmaking:last_sweep";
/// Leaderboard index by total winnings.
pub const LEADERBOARD_BY_WINNINGS_KEY: &str = "leaderboard:byWinnings";
/// Leaderboard index by win count.
pub const LEADERBOARD_BY_WINS_KEY: &str = "leaderboard:byWins";

/// Canonical label for a wager tier (trailing zeros stripped).
#[must_use]
pub fn tier_label(amount: Decimal) -> String {
    amount.normalize().to_string()
}

#[must_use]
pub fn match_key(id: MatchId) -> String {
    format!("{MATCH_PREFIX}{id}")
}

#[must_use]
pub fn request_key(id: RequestId) -> String {
    format!("{REQUEST_PREFIX}{id}")
}

/// Per-tier pending-request queue.
#[must_use]
pub fn pending_queue_key(amount: Decimal) -> String {
    pending_queue_key_for_label(&tier_label(amount))
}

/// Same queue key, from an already-normalized tier label (sweeper path).
#[must_use]
pub fn pending_queue_key_for_label(label: &str) -> String {
    format!("matchmaking:pending:{label}")
}

/// Per-player leaderboard record.
#[must_use]
pub fn player_key(player: &PlayerId) -> String {
    format!("leaderboard:player:{player}")
}
