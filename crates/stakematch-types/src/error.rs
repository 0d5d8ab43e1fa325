//! Error types for the StakeMatch wagering core.
//!
//! All errors use the `SM_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Match lifecycle errors
//! - 2xx: Matchmaking errors
//! - 3xx: Lock errors
//! - 4xx: Settlement errors
//! - 9xx: General / internal errors
//!
//! Each variant also maps onto a stable [`ErrorKind`] so the calling layer
//! can translate to response codes without matching on individual variants.
//! Messages carry a human-readable summary only — never lock tokens or raw
//! store payloads.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{MatchId, MatchStatus, RequestId, RequestStatus, TransferId};

/// Stable error classification consumed by the (external) API layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input. Reported to the caller, never retried.
    Validation,
    /// Invalid transition or conflicting concurrent write. Re-read and retry.
    StateConflict,
    /// The entity does not exist. Terminal.
    NotFound,
    /// Lock / network / handle acquisition trouble. Retried internally with
    /// bounded backoff before surfacing.
    TransientInfra,
    /// Insufficient escrow balance. Fatal, requires operator intervention.
    Funds,
    /// Transfer submitted but confirmation unknown. Must be resolved by an
    /// idempotent status re-check before any retry.
    TransferAmbiguous,
    /// Unrecoverable internal failure.
    Internal,
}

/// Central error enum for all StakeMatch operations.
#[derive(Debug, Error)]
pub enum StakematchError {
    // =================================================================
    // Match Lifecycle Errors (1xx)
    // =================================================================
    /// The requested match was not found.
    #[error("SM_ERR_100: Match not found: {0}")]
    MatchNotFound(MatchId),

    /// The wager amount failed validation (non-positive or out of bounds).
    #[error("SM_ERR_101: Invalid wager {amount}: {reason}")]
    InvalidWager { amount: Decimal, reason: String },

    /// The match already has a second player.
    #[error("SM_ERR_102: Match {0} is already full")]
    AlreadyFull(MatchId),

    /// A player attempted to join their own match.
    #[error("SM_ERR_103: Cannot join own match {0}")]
    SelfJoin(MatchId),

    /// The match deadline has passed; the operation arrived too late.
    #[error("SM_ERR_104: Match {0} has expired")]
    MatchExpired(MatchId),

    /// The operation requires an ACTIVE match.
    #[error("SM_ERR_105: Match {id} is {status}, not active")]
    NotActive { id: MatchId, status: MatchStatus },

    /// The submitted winner is not a participant of the match.
    #[error("SM_ERR_106: Winner is not a participant of match {id}")]
    InvalidWinner { id: MatchId },

    /// An attempted transition out of a terminal state. Reported, never
    /// silently ignored.
    #[error("SM_ERR_107: Invalid transition for match {id}: {from} -> {to}")]
    InvalidTransition {
        id: MatchId,
        from: MatchStatus,
        to: MatchStatus,
    },

    /// A concurrent writer got there first. Re-read and retry.
    #[error("SM_ERR_108: Concurrent modification of {entity}")]
    ConcurrentModification { entity: String },

    /// A match with this ID already exists (should never happen with UUIDv7).
    #[error("SM_ERR_109: Match already exists: {0}")]
    DuplicateMatch(MatchId),

    // =================================================================
    // Matchmaking Errors (2xx)
    // =================================================================
    /// The matchmaking request was not found.
    #[error("SM_ERR_200: Match request not found: {0}")]
    RequestNotFound(RequestId),

    /// The request is no longer pending.
    #[error("SM_ERR_201: Match request {id} is {status}, not pending")]
    RequestNotPending {
        id: RequestId,
        status: RequestStatus,
    },

    /// A request with this ID already exists (should never happen with
    /// UUIDv7).
    #[error("SM_ERR_202: Match request already exists: {0}")]
    DuplicateRequest(RequestId),

    // =================================================================
    // Lock Errors (3xx)
    // =================================================================
    /// The distributed lock is held by another owner.
    #[error("SM_ERR_300: Lock unavailable: {key}")]
    LockUnavailable { key: String },

    // =================================================================
    // Settlement Errors (4xx)
    // =================================================================
    /// Escrow balance cannot cover payout plus fee buffer. Fatal, never
    /// retried automatically.
    #[error("SM_ERR_400: Insufficient escrow balance: need {needed}, have {available}")]
    InsufficientEscrow { needed: Decimal, available: Decimal },

    /// Transfer handle acquisition failed after bounded retries.
    #[error("SM_ERR_401: Transfer network unavailable after {attempts} attempts: {reason}")]
    NetworkUnavailable { attempts: u32, reason: String },

    /// The transfer was submitted but confirmation timed out. Retryable only
    /// after re-checking transfer status by its ID.
    #[error("SM_ERR_402: Transfer {transfer_id} unconfirmed within timeout")]
    TransferUnconfirmed { transfer_id: TransferId },

    /// The transfer network rejected the submission. Non-retryable.
    #[error("SM_ERR_403: Transfer rejected: {reason}")]
    TransferRejected { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("SM_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("SM_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (fee caps exceeded, bad bounds, etc.).
    #[error("SM_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// Ledger store access error.
    #[error("SM_ERR_903: Storage error: {0}")]
    Storage(String),
}

impl StakematchError {
    /// Map the variant onto the stable taxonomy.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidWager { .. } | Self::SelfJoin(_) | Self::InvalidWinner { .. } => {
                ErrorKind::Validation
            }
            Self::AlreadyFull(_)
            | Self::MatchExpired(_)
            | Self::NotActive { .. }
            | Self::InvalidTransition { .. }
            | Self::ConcurrentModification { .. }
            | Self::RequestNotPending { .. } => ErrorKind::StateConflict,
            Self::MatchNotFound(_) | Self::RequestNotFound(_) => ErrorKind::NotFound,
            Self::LockUnavailable { .. }
            | Self::NetworkUnavailable { .. }
            | Self::Storage(_) => ErrorKind::TransientInfra,
            Self::InsufficientEscrow { .. } => ErrorKind::Funds,
            Self::TransferUnconfirmed { .. } => ErrorKind::TransferAmbiguous,
            Self::DuplicateMatch(_)
            | Self::DuplicateRequest(_)
            | Self::TransferRejected { .. }
            | Self::Internal(_)
            | Self::Serialization(_)
            | Self::Configuration(_) => ErrorKind::Internal,
        }
    }

    /// Whether the caller may retry the operation as-is.
    ///
    /// Ambiguous transfers are excluded: they require a status re-check by
    /// transfer ID first, never a blind retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::StateConflict | ErrorKind::TransientInfra
        )
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, StakematchError>;

impl From<serde_json::Error> for StakematchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
