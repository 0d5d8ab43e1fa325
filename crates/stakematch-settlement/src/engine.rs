//! The settlement flow: one executed payout per match, exactly once.
//!
//! `settle` is safe to call repeatedly for the same match and winner. The
//! match record itself is the idempotency key: once the completion write
//! lands (winner, transfer signature, and `completed` status in one
//! compare-and-swap), every later call short-circuits to the recorded
//! outcome. Failures before the submit leave the match `active` and
//! untouched; an unconfirmed submit is reported as ambiguous rather than
//! retried blindly, because retrying a possibly-applied transfer would pay
//! twice.

use std::sync::Arc;
use std::time::Instant;

use rust_decimal::Decimal;
use stakematch_matchcore::MatchRegistry;
use stakematch_store::LedgerStore;
use stakematch_types::{
    Match, MatchId, MatchStatus, PlayerId, Result, SettlementConfig, StakematchError, TransferId,
};

use crate::fees::FeeSchedule;
use crate::leaderboard::Leaderboard;
use crate::network::{ConfirmStatus, TransferNetwork, TransferRequest};

/// Interval between confirmation polls.
const CONFIRM_POLL_MS: u64 = 25;

/// Outcome of a settle call.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub match_id: MatchId,
    pub winner: PlayerId,
    pub transfer_id: TransferId,
    /// Winner payout after fees.
    pub payout: Decimal,
    /// True when this call found the match already settled and returned
    /// the recorded outcome instead of paying again.
    pub already_settled: bool,
}

/// Drives a match from `active` to `completed` with its payout executed.
pub struct SettlementEngine<S: LedgerStore, N: TransferNetwork> {
    registry: MatchRegistry<S>,
    leaderboard: Leaderboard<S>,
    network: Arc<N>,
    config: SettlementConfig,
    fees: FeeSchedule,
}

impl<S: LedgerStore, N: TransferNetwork> SettlementEngine<S, N> {
    /// Build an engine over the shared registry and a network adapter.
    ///
    /// # Errors
    /// Returns `Configuration` when the config fails validation.
    pub fn new(
        registry: MatchRegistry<S>,
        leaderboard: Leaderboard<S>,
        network: Arc<N>,
        config: SettlementConfig,
    ) -> Result<Self> {
        config.validate()?;
        let fees = FeeSchedule::from_config(&config)?;
        Ok(Self {
            registry,
            leaderboard,
            network,
            config,
            fees,
        })
    }

    #[must_use]
    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    /// Settle an active match: verify the winner, check escrow covers the
    /// payout plus the network-cost buffer, execute the transfer, confirm
    /// it, and record the completion. Idempotent per match.
    ///
    /// # Errors
    /// - `MatchNotFound`, `NotActive`, `InvalidWinner` on a bad target
    /// - `InsufficientEscrow` before anything is submitted
    /// - `NetworkUnavailable` when no transfer handle could be acquired
    /// - `TransferRejected` when the network refused the payout
    /// - `TransferUnconfirmed` when the payout's fate is unknown; the match
    ///   stays `active` and the case needs operator reconciliation
    pub fn settle(&self, match_id: MatchId, winner: &PlayerId) -> Result<Settlement> {
        let m = self.load(match_id)?;
        if let Some(recorded) = self.short_circuit(&m, winner)? {
            return Ok(recorded);
        }
        if m.status != MatchStatus::Active {
            return Err(StakematchError::NotActive {
                id: match_id,
                status: m.status,
            });
        }
        if !m.is_participant(winner) {
            return Err(StakematchError::InvalidWinner { id: match_id });
        }

        let payout = self.fees.payout(m.wager_amount);
        self.check_escrow(payout)?;

        let handle = self.acquire_handle()?;
        let request = TransferRequest {
            match_id,
            recipient: winner.clone(),
            amount: payout,
            handle,
        };
        let transfer_id = self.network.submit(&request)?;
        self.await_confirmation(&transfer_id)?;

        let completed = self
            .registry
            .complete_match(match_id, winner.clone(), transfer_id.clone())?;
        self.record_on_leaderboard(&completed, payout);

        tracing::info!(
            %match_id,
            winner = %winner.short(),
            %payout,
            transfer = %transfer_id,
            "match settled"
        );
        Ok(Settlement {
            match_id,
            winner: winner.clone(),
            transfer_id,
            payout,
            already_settled: false,
        })
    }

    fn load(&self, match_id: MatchId) -> Result<Match> {
        self.registry
            .get_match(match_id)?
            .ok_or(StakematchError::MatchNotFound(match_id))
    }

    /// A completed match replays its recorded outcome; a conflicting winner
    /// claim against it is an error, never a second payout.
    fn short_circuit(&self, m: &Match, winner: &PlayerId) -> Result<Option<Settlement>> {
        if m.status != MatchStatus::Completed {
            return Ok(None);
        }
        if m.winner.as_ref() != Some(winner) {
            return Err(StakematchError::InvalidWinner { id: m.id });
        }
        let transfer_id = m
            .transfer_id
            .clone()
            .ok_or_else(|| StakematchError::Internal("completed match without transfer".into()))?;
        tracing::debug!(match_id = %m.id, "settle replayed recorded outcome");
        Ok(Some(Settlement {
            match_id: m.id,
            winner: winner.clone(),
            transfer_id,
            payout: self.fees.payout(m.wager_amount),
            already_settled: true,
        }))
    }

    fn check_escrow(&self, payout: Decimal) -> Result<()> {
        let needed = payout + self.config.fee_buffer;
        let available = self.network.escrow_balance()?;
        if available < needed {
            return Err(StakematchError::InsufficientEscrow { needed, available });
        }
        Ok(())
    }

    /// Bounded retry with doubling backoff; handles are cheap to fetch and
    /// go stale quickly, so a fresh one is taken right before submit.
    fn acquire_handle(&self) -> Result<crate::network::TransferHandle> {
        let mut backoff_ms = self.config.retry_backoff_ms;
        let attempts = self.config.handle_retries.max(1);

        for attempt in 1..=attempts {
            match self.network.latest_handle() {
                Ok(handle) => return Ok(handle),
                Err(err) if attempt < attempts && err.is_retryable() => {
                    tracing::warn!(attempt, %err, "transfer handle fetch failed, backing off");
                    std::thread::sleep(std::time::Duration::from_millis(backoff_ms));
                    backoff_ms = backoff_ms.saturating_mul(2);
                }
                Err(err) => {
                    return Err(StakematchError::NetworkUnavailable {
                        attempts,
                        reason: err.to_string(),
                    });
                }
            }
        }
        Err(StakematchError::NetworkUnavailable {
            attempts,
            reason: "transfer handle attempts exhausted".to_string(),
        })
    }

    /// Poll to a terminal confirmation state or the configured deadline.
    ///
    /// The transfer is already submitted when this runs, so a failing
    /// status check must surface as ambiguous: a transport error here says
    /// nothing about whether the payout applied, and a retryable error
    /// would invite a second submit.
    fn await_confirmation(&self, transfer_id: &TransferId) -> Result<()> {
        let deadline = Instant::now() + self.config.confirm_timeout();
        loop {
            let status = match self.network.confirm(transfer_id) {
                Ok(status) => status,
                Err(err) => {
                    tracing::warn!(transfer = %transfer_id, %err, "confirmation check failed");
                    return Err(StakematchError::TransferUnconfirmed {
                        transfer_id: transfer_id.clone(),
                    });
                }
            };
            match status {
                ConfirmStatus::Confirmed => return Ok(()),
                ConfirmStatus::Rejected(reason) => {
                    return Err(StakematchError::TransferRejected { reason });
                }
                ConfirmStatus::Pending => {
                    if Instant::now() >= deadline {
                        return Err(StakematchError::TransferUnconfirmed {
                            transfer_id: transfer_id.clone(),
                        });
                    }
                    std::thread::sleep(std::time::Duration::from_millis(CONFIRM_POLL_MS));
                }
            }
        }
    }

    /// Leaderboard bookkeeping is best-effort after the completion write:
    /// the payout already happened, so a stats failure must not fail the
    /// settlement.
    fn record_on_leaderboard(&self, completed: &Match, payout: Decimal) {
        let Some(winner) = completed.winner.as_ref() else {
            return;
        };
        let Some(loser) = completed.opponent_of(winner) else {
            return;
        };
        if let Err(err) = self.leaderboard.record_result(winner, loser, payout) {
            tracing::error!(match_id = %completed.id, %err, "leaderboard update failed");
        }
    }
}
