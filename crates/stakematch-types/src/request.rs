//! Matchmaking requests: a single player's intent to be paired at a wager
//! tier.
//!
//! Requests live in a per-tier sorted set scored by enqueue time, so
//! insertion order is pairing priority. The state machine mirrors the match
//! one in miniature: `pending -> matched | expired | cancelled`, all three
//! of which are terminal.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{MatchId, PlayerId, RequestId, Result, StakematchError};

/// Lifecycle status of a matchmaking request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Matched,
    Expired,
    Cancelled,
}

impl RequestStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Matched => "matched",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// One player's intent to be paired at a given wager tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRequest {
    pub id: RequestId,
    pub player: PlayerId,
    pub wager_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub status: RequestStatus,
    /// Set when the request is consumed by a pairing.
    pub match_id: Option<MatchId>,
    /// Optimistic-concurrency counter.
    pub version: u64,
}

impl MatchRequest {
    #[must_use]
    pub fn new(player: PlayerId, wager_amount: Decimal, now: DateTime<Utc>) -> Self {
        Self {
            id: RequestId::new(),
            player,
            wager_amount,
            created_at: now,
            status: RequestStatus::Pending,
            match_id: None,
            version: 0,
        }
    }

    /// Whether the request deadline (`created_at + ttl`) has passed.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now > self.created_at + ttl
    }

    fn ensure_pending(&self) -> Result<()> {
        if self.status == RequestStatus::Pending {
            Ok(())
        } else {
            Err(StakematchError::RequestNotPending {
                id: self.id,
                status: self.status,
            })
        }
    }

    /// Consume the request into a match.
    ///
    /// # Errors
    /// Returns `RequestNotPending` from any terminal state.
    pub fn mark_matched(&mut self, match_id: MatchId) -> Result<()> {
        self.ensure_pending()?;
        self.status = RequestStatus::Matched;
        self.match_id = Some(match_id);
        Ok(())
    }

    /// Cancel a still-pending request.
    ///
    /// # Errors
    /// Returns `RequestNotPending` from any terminal state.
    pub fn mark_cancelled(&mut self) -> Result<()> {
        self.ensure_pending()?;
        self.status = RequestStatus::Cancelled;
        Ok(())
    }

    /// Expire a still-pending request (sweeper path).
    ///
    /// # Errors
    /// Returns `RequestNotPending` from any terminal state.
    pub fn mark_expired(&mut self) -> Result<()> {
        self.ensure_pending()?;
        self.status = RequestStatus::Expired;
        Ok(())
    }
}
