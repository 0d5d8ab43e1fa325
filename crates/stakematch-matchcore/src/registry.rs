//! The Match Registry: exclusive owner of match-record writes.
//!
//! Every mutation follows the same round-trip: load the raw record, apply
//! the transition on the entity, bump the version, and compare-and-swap the
//! serialized result against the raw bytes that were read. A losing writer
//! surfaces `ConcurrentModification` for the caller to re-read and retry —
//! conflicting writes are never silently overwritten.
//!
//! Pending matches are additionally indexed in a deadline-scored sorted set
//! consumed by the expiry sweeper; the index entry is dropped on join,
//! cancel, and expiry.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use stakematch_store::{keys, LedgerStore};
use stakematch_types::{
    Match, MatchId, MatchStatus, MatchmakingConfig, PlayerId, Result, StakematchError, TransferId,
};

/// Owns match entities in the Ledger Store.
pub struct MatchRegistry<S: LedgerStore> {
    store: Arc<S>,
    config: MatchmakingConfig,
}

impl<S: LedgerStore> Clone for MatchRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn deadline_score(m: &Match) -> f64 {
    m.expires_at.timestamp_millis() as f64
}

impl<S: LedgerStore> MatchRegistry<S> {
    /// Build a registry over the given store.
    ///
    /// # Errors
    /// Returns `Configuration` when the config fails validation.
    pub fn new(store: Arc<S>, config: MatchmakingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    #[must_use]
    pub fn config(&self) -> &MatchmakingConfig {
        &self.config
    }

    /// Create an open match awaiting a second player.
    ///
    /// # Errors
    /// - `InvalidWager` for non-positive or out-of-bounds amounts
    pub fn create_match(
        &self,
        creator: PlayerId,
        wager_amount: Decimal,
        ttl: Duration,
    ) -> Result<Match> {
        self.config.check_wager(wager_amount)?;
        let m = Match::new(creator, wager_amount, ttl, Utc::now());
        self.insert(&m)?;
        self.store
            .zadd(keys::PENDING_MATCHES_KEY, &m.id.to_string(), deadline_score(&m))?;
        tracing::info!(match_id = %m.id, player = %m.player1.short(), wager = %m.wager_amount, "match created");
        Ok(m)
    }

    /// Persist a freshly assembled match record (single atomic write).
    pub(crate) fn insert(&self, m: &Match) -> Result<()> {
        let payload = serde_json::to_string(m)?;
        if !self.store.set_nx(&keys::match_key(m.id), &payload)? {
            return Err(StakematchError::DuplicateMatch(m.id));
        }
        Ok(())
    }

    /// Pure read; no side effects.
    pub fn get_match(&self, id: MatchId) -> Result<Option<Match>> {
        match self.store.get(&keys::match_key(id))? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn load(&self, id: MatchId) -> Result<(Match, String)> {
        let raw = self
            .store
            .get(&keys::match_key(id))?
            .ok_or(StakematchError::MatchNotFound(id))?;
        let m: Match = serde_json::from_str(&raw)?;
        Ok((m, raw))
    }

    /// CAS the mutated record back against the raw bytes it was read from.
    fn persist(&self, m: &mut Match, read_raw: &str) -> Result<()> {
        m.version += 1;
        let payload = serde_json::to_string(m)?;
        if self
            .store
            .compare_and_swap(&keys::match_key(m.id), read_raw, &payload)?
        {
            Ok(())
        } else {
            Err(StakematchError::ConcurrentModification {
                entity: format!("match {}", m.id),
            })
        }
    }

    /// Seat the second player.
    ///
    /// # Errors
    /// `NotFound`, `AlreadyFull`, `SelfJoin`, `MatchExpired`, or
    /// `ConcurrentModification` on a racing write.
    pub fn join_match(&self, id: MatchId, joiner: PlayerId) -> Result<Match> {
        let (mut m, raw) = self.load(id)?;
        m.join(joiner, Utc::now())?;
        self.persist(&mut m, &raw)?;
        self.store
            .zrem(keys::PENDING_MATCHES_KEY, &id.to_string())?;
        tracing::info!(match_id = %id, player = %m.player2.as_ref().map(PlayerId::short).unwrap_or_default(), "match joined");
        Ok(m)
    }

    /// Record the settled result. The transfer ID is mandatory: a match
    /// turns `completed` in the same write that records its payout, so a
    /// silently failed payout can never leave a completed match behind.
    ///
    /// # Errors
    /// `NotFound`, `NotActive`, `InvalidWinner`, or
    /// `ConcurrentModification`.
    pub fn complete_match(
        &self,
        id: MatchId,
        winner: PlayerId,
        transfer_id: TransferId,
    ) -> Result<Match> {
        let (mut m, raw) = self.load(id)?;
        m.complete(winner, transfer_id, Utc::now())?;
        self.persist(&mut m, &raw)?;
        tracing::info!(
            match_id = %id,
            winner = %m.winner.as_ref().map(PlayerId::short).unwrap_or_default(),
            "match completed"
        );
        Ok(m)
    }

    /// Cancel from `pending` or `active`.
    ///
    /// # Errors
    /// `NotFound`, `InvalidTransition` from terminal states, or
    /// `ConcurrentModification`.
    pub fn cancel_match(&self, id: MatchId, reason: &str) -> Result<Match> {
        let (mut m, raw) = self.load(id)?;
        let was_pending = m.status == MatchStatus::Pending;
        m.cancel(reason, Utc::now())?;
        self.persist(&mut m, &raw)?;
        if was_pending {
            self.store
                .zrem(keys::PENDING_MATCHES_KEY, &id.to_string())?;
        }
        tracing::info!(match_id = %id, reason, "match cancelled");
        Ok(m)
    }

    /// Expire a stale pending match (sweeper path). Idempotent per entry:
    /// a second attempt on an already-expired match fails the transition
    /// check and the sweeper skips it.
    ///
    /// # Errors
    /// `NotFound`, `InvalidTransition` unless pending, or
    /// `ConcurrentModification`.
    pub fn mark_expired(&self, id: MatchId, now: DateTime<Utc>) -> Result<Match> {
        let (mut m, raw) = self.load(id)?;
        m.expire(now)?;
        self.persist(&mut m, &raw)?;
        self.store
            .zrem(keys::PENDING_MATCHES_KEY, &id.to_string())?;
        Ok(m)
    }
}
