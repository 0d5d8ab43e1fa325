//! Leaderboard maintenance and ranked reads.
//!
//! Per-player records live under their own keys; two sorted-set indexes
//! (by total winnings and by win count) serve the ranked views. Updates go
//! through the same compare-and-swap discipline as every other entity, with
//! a short in-process retry since two settlements can touch the same player
//! back to back.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use stakematch_store::{keys, LedgerStore};
use stakematch_types::{PlayerId, PlayerStats, Result, StakematchError};

const MAX_UPDATE_ATTEMPTS: usize = 5;

/// Read and write access to the leaderboard.
pub struct Leaderboard<S: LedgerStore> {
    store: Arc<S>,
}

impl<S: LedgerStore> Clone for Leaderboard<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: LedgerStore> Leaderboard<S> {
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Fold one settled match into both players' records and reindex them.
    ///
    /// # Errors
    /// `ConcurrentModification` when a player's record keeps getting raced
    /// past the retry budget.
    pub fn record_result(
        &self,
        winner: &PlayerId,
        loser: &PlayerId,
        payout: Decimal,
    ) -> Result<()> {
        self.update_player(winner, |stats, now| stats.record_win(payout, now))?;
        self.update_player(loser, PlayerStats::record_loss)?;
        tracing::debug!(winner = %winner.short(), loser = %loser.short(), %payout, "leaderboard updated");
        Ok(())
    }

    /// Pure read; no side effects.
    pub fn player(&self, player: &PlayerId) -> Result<Option<PlayerStats>> {
        match self.store.get(&keys::player_key(player))? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// 1-based rank by total winnings, highest first. `None` for players
    /// with no record.
    pub fn rank(&self, player: &PlayerId) -> Result<Option<u64>> {
        if self
            .store
            .zscore(keys::LEADERBOARD_BY_WINNINGS_KEY, player.as_str())?
            .is_none()
        {
            return Ok(None);
        }
        let ranked = self
            .store
            .zrange(keys::LEADERBOARD_BY_WINNINGS_KEY, 0, -1, true)?;
        Ok(ranked
            .iter()
            .position(|member| member == player.as_str())
            .map(|idx| idx as u64 + 1))
    }

    /// 1-based rank by win count, highest first.
    pub fn rank_by_wins(&self, player: &PlayerId) -> Result<Option<u64>> {
        let ranked = self
            .store
            .zrange(keys::LEADERBOARD_BY_WINS_KEY, 0, -1, true)?;
        Ok(ranked
            .iter()
            .position(|member| member == player.as_str())
            .map(|idx| idx as u64 + 1))
    }

    /// Top `limit` players by total winnings.
    pub fn top(&self, limit: usize) -> Result<Vec<PlayerStats>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let stop = i64::try_from(limit).unwrap_or(i64::MAX) - 1;
        let members = self
            .store
            .zrange(keys::LEADERBOARD_BY_WINNINGS_KEY, 0, stop, true)?;
        let mut out = Vec::with_capacity(members.len());
        for member in members {
            if let Some(stats) = self.player(&PlayerId::new(member))? {
                out.push(stats);
            }
        }
        Ok(out)
    }

    /// Number of players with a record.
    pub fn player_count(&self) -> Result<usize> {
        self.store.zcard(keys::LEADERBOARD_BY_WINNINGS_KEY)
    }

    fn update_player(
        &self,
        player: &PlayerId,
        apply: impl Fn(&mut PlayerStats, chrono::DateTime<Utc>),
    ) -> Result<()> {
        let key = keys::player_key(player);

        for _ in 0..MAX_UPDATE_ATTEMPTS {
            let now = Utc::now();
            let existing = self.store.get(&key)?;

            let written = match &existing {
                Some(raw) => {
                    let mut stats: PlayerStats = serde_json::from_str(raw)?;
                    apply(&mut stats, now);
                    let payload = serde_json::to_string(&stats)?;
                    if self.store.compare_and_swap(&key, raw, &payload)? {
                        Some(stats)
                    } else {
                        None
                    }
                }
                None => {
                    let mut stats = PlayerStats::new(player.clone(), now);
                    apply(&mut stats, now);
                    let payload = serde_json::to_string(&stats)?;
                    if self.store.set_nx(&key, &payload)? {
                        Some(stats)
                    } else {
                        None
                    }
                }
            };

            if let Some(stats) = written {
                self.reindex(&stats)?;
                return Ok(());
            }
            // Raced; reload and reapply.
        }

        Err(StakematchError::ConcurrentModification {
            entity: format!("player stats {player}"),
        })
    }

    #[allow(clippy::cast_precision_loss)]
    fn reindex(&self, stats: &PlayerStats) -> Result<()> {
        self.store.zadd(
            keys::LEADERBOARD_BY_WINNINGS_KEY,
            stats.player.as_str(),
            stats.total_winnings.to_f64().unwrap_or(0.0),
        )?;
        self.store.zadd(
            keys::LEADERBOARD_BY_WINS_KEY,
            stats.player.as_str(),
            stats.wins as f64,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stakematch_store::MemoryStore;
    use std::str::FromStr;

    fn board() -> Leaderboard<MemoryStore> {
        Leaderboard::new(Arc::new(MemoryStore::new()))
    }

    fn payout() -> Decimal {
        Decimal::from_str("1.87").unwrap()
    }

    #[test]
    fn first_result_creates_both_records() {
        let b = board();
        b.record_result(&PlayerId::new("alice"), &PlayerId::new("bob"), payout())
            .unwrap();

        let alice = b.player(&PlayerId::new("alice")).unwrap().unwrap();
        assert_eq!(alice.wins, 1);
        assert_eq!(alice.total_winnings, payout());
        let bob = b.player(&PlayerId::new("bob")).unwrap().unwrap();
        assert_eq!(bob.losses, 1);
        assert_eq!(bob.total_winnings, Decimal::ZERO);
        assert_eq!(b.player_count().unwrap(), 2);
    }

    #[test]
    fn rank_orders_by_winnings_desc() {
        let b = board();
        // Alice wins twice, carol once, bob never.
        b.record_result(&PlayerId::new("alice"), &PlayerId::new("bob"), payout())
            .unwrap();
        b.record_result(&PlayerId::new("alice"), &PlayerId::new("carol"), payout())
            .unwrap();
        b.record_result(&PlayerId::new("carol"), &PlayerId::new("bob"), payout())
            .unwrap();

        assert_eq!(b.rank(&PlayerId::new("alice")).unwrap(), Some(1));
        assert_eq!(b.rank(&PlayerId::new("carol")).unwrap(), Some(2));
        assert_eq!(b.rank(&PlayerId::new("bob")).unwrap(), Some(3));
        assert_eq!(b.rank(&PlayerId::new("stranger")).unwrap(), None);
    }

    #[test]
    fn top_returns_full_records_in_order() {
        let b = board();
        b.record_result(&PlayerId::new("alice"), &PlayerId::new("bob"), payout())
            .unwrap();
        b.record_result(&PlayerId::new("alice"), &PlayerId::new("bob"), payout())
            .unwrap();

        let top = b.top(1).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].player, PlayerId::new("alice"));
        assert_eq!(top[0].wins, 2);

        assert!(b.top(0).unwrap().is_empty());
        assert_eq!(b.top(10).unwrap().len(), 2);
    }

    #[test]
    fn concurrent_updates_to_one_player_all_land() {
        let b = board();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let b = b.clone();
                std::thread::spawn(move || {
                    b.record_result(
                        &PlayerId::new("alice"),
                        &PlayerId::new(format!("loser{i}")),
                        payout(),
                    )
                    .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let alice = b.player(&PlayerId::new("alice")).unwrap().unwrap();
        assert_eq!(alice.wins, 4);
        assert_eq!(alice.total_winnings, payout() * Decimal::from(4));
    }
}
