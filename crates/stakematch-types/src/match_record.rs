//! The match entity: one wagered contest between two players.
//!
//! The state machine is monotonic:
//!
//! ```text
//! pending -> active -> completed
//! pending -> expired
//! pending | active -> cancelled
//! ```
//!
//! `completed`, `cancelled`, and `expired` are terminal. Any attempted
//! transition out of a terminal state fails with `InvalidTransition`.
//! Transition logic lives on the entity itself; the registry wraps it in
//! persistence and optimistic concurrency.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{MatchId, PlayerId, Result, StakematchError, TransferId};

/// Lifecycle status of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    /// Created, waiting for a second player.
    Pending,
    /// Both players joined; the game is in progress.
    Active,
    /// Settled: winner recorded, payout executed.
    Completed,
    /// Cancelled by a player or an operator before completion.
    Cancelled,
    /// Deadline passed before a second player joined.
    Expired,
}

impl MatchStatus {
    /// Terminal states admit no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Expired)
    }

    /// Whether the state machine permits `self -> to`.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Active | Self::Expired | Self::Cancelled)
                | (Self::Active, Self::Completed | Self::Cancelled)
        )
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        };
        write!(f, "{s}")
    }
}

/// One wagered contest.
///
/// Writes go exclusively through the Match Registry; everything else reads.
/// `version` is the optimistic-concurrency counter bumped on every persisted
/// write, so conflicting writers are detected instead of overwriting each
/// other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    /// The creator's public key.
    pub player1: PlayerId,
    /// Absent until a second player joins.
    pub player2: Option<PlayerId>,
    /// Per-player stake. Positive, immutable after creation.
    pub wager_amount: Decimal,
    pub status: MatchStatus,
    pub created_at: DateTime<Utc>,
    pub joined_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Join deadline, `created_at + ttl`.
    pub expires_at: DateTime<Utc>,
    /// Set only on the transition to `completed`. Always one of the two
    /// participants.
    pub winner: Option<PlayerId>,
    /// Signature of the payout transfer. Recorded before (atomically with)
    /// the `completed` write — a match is never `completed` without it.
    pub transfer_id: Option<TransferId>,
    /// Reason string recorded on cancellation.
    pub cancel_reason: Option<String>,
    /// Optimistic-concurrency counter.
    pub version: u64,
}

impl Match {
    /// Create a fresh pending match.
    #[must_use]
    pub fn new(creator: PlayerId, wager_amount: Decimal, ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            id: MatchId::new(),
            player1: creator,
            player2: None,
            wager_amount,
            status: MatchStatus::Pending,
            created_at: now,
            joined_at: None,
            completed_at: None,
            expires_at: now + ttl,
            winner: None,
            transfer_id: None,
            cancel_reason: None,
            version: 0,
        }
    }

    /// Whether `player` is one of the two participants.
    #[must_use]
    pub fn is_participant(&self, player: &PlayerId) -> bool {
        &self.player1 == player || self.player2.as_ref() == Some(player)
    }

    /// The opponent of `player`, once both seats are filled.
    #[must_use]
    pub fn opponent_of(&self, player: &PlayerId) -> Option<&PlayerId> {
        let p2 = self.player2.as_ref()?;
        if &self.player1 == player {
            Some(p2)
        } else if p2 == player {
            Some(&self.player1)
        } else {
            None
        }
    }

    /// Whether the join deadline has passed.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    fn check_transition(&self, to: MatchStatus) -> Result<()> {
        if self.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(StakematchError::InvalidTransition {
                id: self.id,
                from: self.status,
                to,
            })
        }
    }

    /// Seat the second player and activate the match.
    ///
    /// # Errors
    /// - `AlreadyFull` if a second player is already seated
    /// - `SelfJoin` if the joiner created the match
    /// - `MatchExpired` if the join deadline has passed
    /// - `InvalidTransition` if the match left `pending`
    pub fn join(&mut self, joiner: PlayerId, now: DateTime<Utc>) -> Result<()> {
        if self.player2.is_some() {
            return Err(StakematchError::AlreadyFull(self.id));
        }
        if joiner == self.player1 {
            return Err(StakematchError::SelfJoin(self.id));
        }
        if self.is_expired(now) {
            return Err(StakematchError::MatchExpired(self.id));
        }
        self.check_transition(MatchStatus::Active)?;
        self.player2 = Some(joiner);
        self.joined_at = Some(now);
        self.status = MatchStatus::Active;
        Ok(())
    }

    /// Record the settled result. The transfer ID is required up front so a
    /// completed match always carries its payout record.
    ///
    /// # Errors
    /// - `NotActive` if the match is not in the `active` state
    /// - `InvalidWinner` if the winner is not a participant
    pub fn complete(
        &mut self,
        winner: PlayerId,
        transfer_id: TransferId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.status != MatchStatus::Active {
            return Err(StakematchError::NotActive {
                id: self.id,
                status: self.status,
            });
        }
        if !self.is_participant(&winner) {
            return Err(StakematchError::InvalidWinner { id: self.id });
        }
        self.check_transition(MatchStatus::Completed)?;
        self.winner = Some(winner);
        self.transfer_id = Some(transfer_id);
        self.completed_at = Some(now);
        self.status = MatchStatus::Completed;
        Ok(())
    }

    /// Cancel from `pending` or `active`.
    ///
    /// # Errors
    /// Returns `InvalidTransition` from any terminal state.
    pub fn cancel(&mut self, reason: impl Into<String>, now: DateTime<Utc>) -> Result<()> {
        self.check_transition(MatchStatus::Cancelled)?;
        self.cancel_reason = Some(reason.into());
        self.completed_at = Some(now);
        self.status = MatchStatus::Cancelled;
        Ok(())
    }

    /// Expire a still-pending match (sweeper path).
    ///
    /// # Errors
    /// Returns `InvalidTransition` unless the match is `pending`.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.check_transition(MatchStatus::Expired)?;
        self.completed_at = Some(now);
        self.status = MatchStatus::Expired;
        Ok(())
    }
}
