//! The expiry sweeper: a periodic job that expires stale matchmaking
//! requests and pending matches past their join deadline.
//!
//! Only one sweeper instance runs at a time, gated by a store-backed lock
//! with a takeover TTL so a crashed holder cannot wedge the system. Each
//! expiry is an independent compare-and-swap; a conflict on one entry (a
//! player joining at the last moment, say) skips that entry and the sweep
//! carries on.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stakematch_store::{keys, DistributedLock, LedgerStore};
use stakematch_types::{ErrorKind, MatchId, MatchRequest, RequestId, RequestStatus, Result};

use crate::registry::MatchRegistry;

/// Bookkeeping record written after every completed sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepRecord {
    pub swept_at: DateTime<Utc>,
    pub requests_expired: u64,
    pub matches_expired: u64,
    /// Pool entries removed without a record behind them.
    pub orphans_pruned: u64,
}

/// Expires stale requests and pending matches under a store-backed lock.
pub struct ExpirySweeper<S: LedgerStore> {
    store: Arc<S>,
    registry: MatchRegistry<S>,
    lock: DistributedLock<S>,
}

impl<S: LedgerStore> ExpirySweeper<S> {
    #[must_use]
    pub fn new(store: Arc<S>, registry: MatchRegistry<S>) -> Self {
        let lock = DistributedLock::new(
            Arc::clone(&store),
            keys::SWEEP_LOCK_KEY,
            registry.config().sweep_lock_ttl(),
        );
        Self {
            store,
            registry,
            lock,
        }
    }

    /// Run one sweep pass with `now` as the expiry reference time. Returns
    /// `None` without doing any work when another sweeper holds the lock.
    /// `batch_size` bounds how many entries each phase touches in one pass;
    /// the remainder waits for the next.
    ///
    /// # Errors
    /// Storage and serialization failures abort the pass; the lock is
    /// released on the way out regardless.
    pub fn sweep(&self, now: DateTime<Utc>, batch_size: usize) -> Result<Option<SweepRecord>> {
        let Some(_guard) = self.lock.acquire()? else {
            tracing::debug!("sweep skipped, lock held elsewhere");
            return Ok(None);
        };

        let mut record = SweepRecord {
            swept_at: now,
            requests_expired: 0,
            matches_expired: 0,
            orphans_pruned: 0,
        };

        self.sweep_requests(now, batch_size, &mut record)?;
        self.sweep_matches(now, batch_size, &mut record)?;

        self.store
            .set(keys::LAST_SWEEP_KEY, &serde_json::to_string(&record)?)?;
        tracing::info!(
            requests = record.requests_expired,
            matches = record.matches_expired,
            orphans = record.orphans_pruned,
            "sweep complete"
        );
        Ok(Some(record))
    }

    /// The bookkeeping record of the most recent completed sweep.
    pub fn last_sweep(&self) -> Result<Option<SweepRecord>> {
        match self.store.get(keys::LAST_SWEEP_KEY)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn sweep_requests(
        &self,
        now: DateTime<Utc>,
        batch_size: usize,
        record: &mut SweepRecord,
    ) -> Result<()> {
        let ttl = self.registry.config().request_ttl();
        let tiers = self.store.zrange(keys::AMOUNTS_KEY, 0, -1, false)?;
        let mut budget = batch_size;

        for tier in tiers {
            if budget == 0 {
                break;
            }
            let queue_key = keys::pending_queue_key_for_label(&tier);
            let members = self.store.zrange(&queue_key, 0, -1, false)?;

            for member in members {
                if budget == 0 {
                    break;
                }
                let Ok(id) = member.parse::<RequestId>() else {
                    self.store.zrem(&queue_key, &member)?;
                    record.orphans_pruned += 1;
                    continue;
                };
                let Some(raw) = self.store.get(&keys::request_key(id))? else {
                    self.store.zrem(&queue_key, &member)?;
                    record.orphans_pruned += 1;
                    continue;
                };
                let mut request: MatchRequest = serde_json::from_str(&raw)?;

                if request.status != RequestStatus::Pending {
                    // Record already settled elsewhere; just drop the pool entry.
                    self.store.zrem(&queue_key, &member)?;
                    continue;
                }
                if !request.is_expired(now, ttl) {
                    continue;
                }

                budget -= 1;
                request.mark_expired()?;
                request.version += 1;
                let payload = serde_json::to_string(&request)?;
                if self
                    .store
                    .compare_and_swap(&keys::request_key(id), &raw, &payload)?
                {
                    self.store.zrem(&queue_key, &member)?;
                    record.requests_expired += 1;
                } else {
                    // Raced by a pairer or a cancel; whoever won owns the
                    // record now.
                    tracing::debug!(request_id = %id, "request raced during sweep, skipped");
                }
            }
        }
        Ok(())
    }

    fn sweep_matches(
        &self,
        now: DateTime<Utc>,
        batch_size: usize,
        record: &mut SweepRecord,
    ) -> Result<()> {
        let members = self
            .store
            .zrange(keys::PENDING_MATCHES_KEY, 0, -1, false)?;
        let mut budget = batch_size;

        for member in members {
            if budget == 0 {
                break;
            }
            let Ok(id) = member.parse::<MatchId>() else {
                self.store.zrem(keys::PENDING_MATCHES_KEY, &member)?;
                record.orphans_pruned += 1;
                continue;
            };
            let Some(m) = self.registry.get_match(id)? else {
                self.store.zrem(keys::PENDING_MATCHES_KEY, &member)?;
                record.orphans_pruned += 1;
                continue;
            };
            if !m.is_expired(now) {
                // Index is deadline-ordered, so everything after this entry
                // is still live.
                break;
            }

            budget -= 1;
            match self.registry.mark_expired(id, now) {
                Ok(_) => record.matches_expired += 1,
                Err(err) if err.kind() == ErrorKind::StateConflict => {
                    // Joined, cancelled, or expired between the read and the
                    // write. Drop the index entry if it left pending.
                    if let Some(current) = self.registry.get_match(id)? {
                        if current.status != stakematch_types::MatchStatus::Pending {
                            self.store.zrem(keys::PENDING_MATCHES_KEY, &member)?;
                        }
                    }
                    tracing::debug!(match_id = %id, "match raced during sweep, skipped");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{MatchmakingQueue, SubmitOutcome};
    use chrono::Duration;
    use rust_decimal::Decimal;
    use stakematch_store::MemoryStore;
    use stakematch_types::{MatchStatus, MatchmakingConfig, PlayerId};

    struct Fixture {
        store: Arc<MemoryStore>,
        registry: MatchRegistry<MemoryStore>,
        queue: MatchmakingQueue<MemoryStore>,
        sweeper: ExpirySweeper<MemoryStore>,
    }

    fn fixture(config: MatchmakingConfig) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let registry = MatchRegistry::new(Arc::clone(&store), config).unwrap();
        let queue = MatchmakingQueue::new(Arc::clone(&store), registry.clone());
        let sweeper = ExpirySweeper::new(Arc::clone(&store), registry.clone());
        Fixture {
            store,
            registry,
            queue,
            sweeper,
        }
    }

    fn short_ttl_config() -> MatchmakingConfig {
        MatchmakingConfig {
            request_ttl_ms: 0,
            match_ttl_ms: 0,
            ..MatchmakingConfig::default()
        }
    }

    // A reference time comfortably past zero-TTL deadlines, no sleeping.
    fn later() -> DateTime<Utc> {
        Utc::now() + Duration::milliseconds(5)
    }

    #[test]
    fn sweep_on_empty_store_writes_record() {
        let f = fixture(MatchmakingConfig::default());
        let record = f.sweeper.sweep(Utc::now(), 100).unwrap().expect("lock acquired");
        assert_eq!(record.requests_expired, 0);
        assert_eq!(record.matches_expired, 0);
        assert_eq!(f.sweeper.last_sweep().unwrap(), Some(record));
    }

    #[test]
    fn expires_stale_requests_and_matches() {
        let f = fixture(short_ttl_config());
        // Enqueue without pairing so the request is still in the pool when
        // the sweep runs.
        let req = f.queue.enqueue(PlayerId::new("alice"), Decimal::ONE).unwrap();
        let m = f
            .registry
            .create_match(PlayerId::new("bob"), Decimal::ONE, Duration::zero())
            .unwrap();

        let record = f.sweeper.sweep(later(), 100).unwrap().unwrap();
        assert_eq!(record.requests_expired, 1);
        assert_eq!(record.matches_expired, 1);

        let req = f.queue.get_request(req.id).unwrap().unwrap();
        assert_eq!(req.status, RequestStatus::Expired);
        let m = f.registry.get_match(m.id).unwrap().unwrap();
        assert_eq!(m.status, MatchStatus::Expired);
        assert_eq!(f.queue.queue_depth(Decimal::ONE).unwrap(), 0);
    }

    #[test]
    fn second_sweep_is_idempotent() {
        let f = fixture(short_ttl_config());
        f.queue.enqueue(PlayerId::new("alice"), Decimal::ONE).unwrap();

        let first = f.sweeper.sweep(later(), 100).unwrap().unwrap();
        assert_eq!(first.requests_expired, 1);
        let second = f.sweeper.sweep(later(), 100).unwrap().unwrap();
        assert_eq!(second.requests_expired, 0);
        assert_eq!(second.matches_expired, 0);
    }

    #[test]
    fn live_entries_survive_a_sweep() {
        let f = fixture(MatchmakingConfig::default());
        let SubmitOutcome::Queued(req) = f
            .queue
            .submit_request(PlayerId::new("alice"), Decimal::ONE)
            .unwrap()
        else {
            panic!("expected Queued");
        };
        let m = f
            .registry
            .create_match(PlayerId::new("bob"), Decimal::ONE, Duration::minutes(10))
            .unwrap();

        let record = f.sweeper.sweep(Utc::now(), 100).unwrap().unwrap();
        assert_eq!(record.requests_expired, 0);
        assert_eq!(record.matches_expired, 0);
        assert_eq!(
            f.queue.get_request(req.id).unwrap().unwrap().status,
            RequestStatus::Pending
        );
        assert_eq!(
            f.registry.get_match(m.id).unwrap().unwrap().status,
            MatchStatus::Pending
        );
    }

    #[test]
    fn batch_size_bounds_a_pass() {
        let f = fixture(short_ttl_config());
        for i in 0..5 {
            f.queue
                .enqueue(PlayerId::new(format!("p{i}")), Decimal::ONE)
                .unwrap();
        }

        let first = f.sweeper.sweep(later(), 2).unwrap().unwrap();
        assert_eq!(first.requests_expired, 2);
        let second = f.sweeper.sweep(later(), 100).unwrap().unwrap();
        assert_eq!(second.requests_expired, 3);
    }

    #[test]
    fn orphan_pool_entries_are_pruned() {
        let f = fixture(MatchmakingConfig::default());
        f.store
            .zadd(keys::AMOUNTS_KEY, "1", 1.0)
            .unwrap();
        f.store
            .zadd(
                &keys::pending_queue_key_for_label("1"),
                &RequestId::new().to_string(),
                1.0,
            )
            .unwrap();
        f.store
            .zadd(keys::PENDING_MATCHES_KEY, "not-a-uuid", 1.0)
            .unwrap();

        let record = f.sweeper.sweep(Utc::now(), 100).unwrap().unwrap();
        assert_eq!(record.orphans_pruned, 2);
        assert_eq!(
            f.store.zcard(keys::PENDING_MATCHES_KEY).unwrap(),
            0
        );
    }

    #[test]
    fn concurrent_sweeps_exclude_each_other() {
        let f = fixture(MatchmakingConfig::default());
        let guard = f.sweeper.lock.acquire().unwrap().expect("lock free");

        assert!(f.sweeper.sweep(Utc::now(), 100).unwrap().is_none());
        drop(guard);
        assert!(f.sweeper.sweep(Utc::now(), 100).unwrap().is_some());
    }
}
