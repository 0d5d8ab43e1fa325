//! The matchmaking queue: per-wager-tier FIFO pools of pending requests.
//!
//! `enqueue` puts a request into its tier pool in arrival order; `try_pair`
//! consumes the two oldest live requests into an active match. Pairing
//! claims both requests by compare-and-swap before the match record is
//! inserted, so two racing pairers can never consume the same request.
//! `submit_request` composes the two for the common pair-on-arrival path.
//!
//! Tier membership is keyed by the normalized wager rendering, so `1.0`
//! and `1.00` share a pool.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use stakematch_store::{keys, LedgerStore};
use stakematch_types::{
    Match, MatchId, MatchRequest, MatchmakingConfig, PlayerId, RequestId, RequestStatus, Result,
    StakematchError,
};

use crate::registry::MatchRegistry;

/// Rescans tolerated when a pairing claim loses its compare-and-swap.
const MAX_PAIR_ATTEMPTS: usize = 3;

/// Result of submitting a matchmaking request.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Paired immediately with a waiting player; the match is `active`.
    Matched {
        request: MatchRequest,
        game: Match,
    },
    /// No live candidate at this tier; the request is queued.
    Queued(MatchRequest),
}

/// FIFO matchmaking over the Ledger Store.
pub struct MatchmakingQueue<S: LedgerStore> {
    store: Arc<S>,
    registry: MatchRegistry<S>,
}

impl<S: LedgerStore> Clone for MatchmakingQueue<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            registry: self.registry.clone(),
        }
    }
}

// Microsecond resolution keeps arrival order strict even for requests
// landing in the same millisecond.
#[allow(clippy::cast_precision_loss)]
fn enqueue_score(r: &MatchRequest) -> f64 {
    r.created_at.timestamp_micros() as f64
}

impl<S: LedgerStore> MatchmakingQueue<S> {
    #[must_use]
    pub fn new(store: Arc<S>, registry: MatchRegistry<S>) -> Self {
        Self { store, registry }
    }

    fn config(&self) -> &MatchmakingConfig {
        self.registry.config()
    }

    /// Store a new request and place it in its tier pool in arrival order.
    ///
    /// # Errors
    /// - `InvalidWager` for out-of-bounds amounts
    /// - `DuplicateRequest` on an ID collision
    pub fn enqueue(&self, player: PlayerId, wager_amount: Decimal) -> Result<MatchRequest> {
        self.config().check_wager(wager_amount)?;
        let request = MatchRequest::new(player, wager_amount, Utc::now());
        let raw = serde_json::to_string(&request)?;
        if !self.store.set_nx(&keys::request_key(request.id), &raw)? {
            return Err(StakematchError::DuplicateRequest(request.id));
        }

        let queue_key = keys::pending_queue_key(wager_amount);
        self.store
            .zadd(&queue_key, &request.id.to_string(), enqueue_score(&request))?;
        self.store.zadd(
            keys::AMOUNTS_KEY,
            &keys::tier_label(wager_amount),
            wager_amount.to_f64().unwrap_or(0.0),
        )?;
        tracing::debug!(
            request_id = %request.id,
            tier = %keys::tier_label(wager_amount),
            "request queued"
        );
        Ok(request)
    }

    /// Pair the two oldest live requests at a tier into an active match.
    /// The older request takes the creator seat. Returns `None` when fewer
    /// than two compatible requests are waiting (or the pool is too
    /// contended to claim a pair within the rescan budget).
    pub fn try_pair(&self, wager_amount: Decimal) -> Result<Option<Match>> {
        let queue_key = keys::pending_queue_key(wager_amount);

        for _ in 0..MAX_PAIR_ATTEMPTS {
            let Some((mut first, first_raw)) = self.next_candidate(&queue_key, None, None)? else {
                return Ok(None);
            };
            let Some((mut second, second_raw)) =
                self.next_candidate(&queue_key, Some(&first.player), Some(first.id))?
            else {
                return Ok(None);
            };

            // Assemble the match up front so both claims can point at its
            // ID; it is inserted only after both claims land.
            let now = Utc::now();
            let mut game = Match::new(
                first.player.clone(),
                wager_amount,
                self.config().match_ttl(),
                now,
            );
            game.join(second.player.clone(), now)?;

            // Losing a claim means another pairer (or the sweeper, or a
            // cancel) got there first; rescan.
            if !self.claim(&mut first, &first_raw, game.id)? {
                continue;
            }
            if !self.claim(&mut second, &second_raw, game.id)? {
                self.release_candidate(first)?;
                continue;
            }

            self.registry.insert(&game)?;
            self.store.zrem(&queue_key, &first.id.to_string())?;
            self.store.zrem(&queue_key, &second.id.to_string())?;
            tracing::info!(
                match_id = %game.id,
                tier = %keys::tier_label(wager_amount),
                "requests paired"
            );
            return Ok(Some(game));
        }

        // Heavily contended tier; leave the pool for the next caller.
        Ok(None)
    }

    /// Enqueue, then immediately attempt a pairing at the tier.
    ///
    /// # Errors
    /// - `InvalidWager` for out-of-bounds amounts
    /// - `ConcurrentModification` on a raced rollback (retryable)
    pub fn submit_request(&self, player: PlayerId, wager_amount: Decimal) -> Result<SubmitOutcome> {
        let request = self.enqueue(player, wager_amount)?;
        if let Some(game) = self.try_pair(wager_amount)? {
            // The pairing may have consumed two older waiters instead of
            // the caller's request; report Matched only when it was ours.
            if let Some(current) = self.get_request(request.id)? {
                if current.match_id == Some(game.id) {
                    return Ok(SubmitOutcome::Matched {
                        request: current,
                        game,
                    });
                }
            }
        }
        Ok(SubmitOutcome::Queued(request))
    }

    /// Pure read; no side effects.
    pub fn get_request(&self, id: RequestId) -> Result<Option<MatchRequest>> {
        match self.store.get(&keys::request_key(id))? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Number of requests waiting at a tier (live and stale alike; the
    /// sweeper prunes stale entries).
    pub fn queue_depth(&self, wager_amount: Decimal) -> Result<usize> {
        self.store.zcard(&keys::pending_queue_key(wager_amount))
    }

    /// Withdraw a pending request. Cancelling a request that already reached
    /// a terminal state is a no-op returning the record as-is, so a player
    /// racing the pairer sees a clean result either way.
    ///
    /// # Errors
    /// - `RequestNotFound` for unknown IDs
    /// - `ConcurrentModification` on a racing write (retryable)
    pub fn cancel_request(&self, id: RequestId) -> Result<MatchRequest> {
        let raw = self
            .store
            .get(&keys::request_key(id))?
            .ok_or(StakematchError::RequestNotFound(id))?;
        let mut request: MatchRequest = serde_json::from_str(&raw)?;
        if request.status != RequestStatus::Pending {
            return Ok(request);
        }
        request.mark_cancelled()?;
        self.persist_request(&mut request, &raw)?;
        self.store.zrem(
            &keys::pending_queue_key(request.wager_amount),
            &id.to_string(),
        )?;
        tracing::info!(request_id = %id, "request cancelled");
        Ok(request)
    }

    fn persist_request(&self, r: &mut MatchRequest, read_raw: &str) -> Result<()> {
        r.version += 1;
        let payload = serde_json::to_string(r)?;
        if self
            .store
            .compare_and_swap(&keys::request_key(r.id), read_raw, &payload)?
        {
            Ok(())
        } else {
            Err(StakematchError::ConcurrentModification {
                entity: format!("request {}", r.id),
            })
        }
    }

    /// Claim a request for the given match by compare-and-swap against the
    /// payload it was read at. `false` means the swap lost to a concurrent
    /// writer and the request is untouched.
    fn claim(&self, r: &mut MatchRequest, read_raw: &str, game_id: MatchId) -> Result<bool> {
        r.mark_matched(game_id)?;
        r.version += 1;
        let payload = serde_json::to_string(r)?;
        self.store
            .compare_and_swap(&keys::request_key(r.id), read_raw, &payload)
    }

    /// Oldest pending, unexpired request at the tier, minus the exclusions
    /// (the already-picked first half of a pair). Stale pool entries
    /// encountered along the way are cleaned up inline.
    fn next_candidate(
        &self,
        queue_key: &str,
        exclude_player: Option<&PlayerId>,
        exclude_id: Option<RequestId>,
    ) -> Result<Option<(MatchRequest, String)>> {
        let members = self.store.zrange(queue_key, 0, -1, false)?;
        let now = Utc::now();
        let ttl = self.config().request_ttl();

        for member in members {
            let Ok(id) = member.parse::<RequestId>() else {
                self.store.zrem(queue_key, &member)?;
                continue;
            };
            let Some(raw) = self.store.get(&keys::request_key(id))? else {
                self.store.zrem(queue_key, &member)?;
                continue;
            };
            let mut candidate: MatchRequest = serde_json::from_str(&raw)?;

            if candidate.status != RequestStatus::Pending {
                self.store.zrem(queue_key, &member)?;
                continue;
            }
            if candidate.is_expired(now, ttl) {
                // Expire inline rather than pairing a player who gave up.
                if candidate.mark_expired().is_ok()
                    && self.persist_request(&mut candidate, &raw).is_ok()
                {
                    self.store.zrem(queue_key, &member)?;
                    tracing::debug!(request_id = %id, "stale request expired during pairing");
                }
                continue;
            }
            if exclude_id == Some(candidate.id) {
                continue;
            }
            if exclude_player == Some(&candidate.player) {
                continue;
            }
            return Ok(Some((candidate, raw)));
        }
        Ok(None)
    }

    /// Undo the first claim of a pair after the second one failed.
    fn release_candidate(&self, mut candidate: MatchRequest) -> Result<()> {
        let raw = self
            .store
            .get(&keys::request_key(candidate.id))?
            .ok_or(StakematchError::RequestNotFound(candidate.id))?;
        candidate.status = RequestStatus::Pending;
        candidate.match_id = None;
        self.persist_request(&mut candidate, &raw)?;
        // A concurrent scanner may have pruned the claimed entry from the
        // pool; re-adding at the original score keeps its place in line.
        self.store.zadd(
            &keys::pending_queue_key(candidate.wager_amount),
            &candidate.id.to_string(),
            enqueue_score(&candidate),
        )?;
        tracing::warn!(request_id = %candidate.id, "pairing rolled back, candidate released");
        Ok(())
    }
}
