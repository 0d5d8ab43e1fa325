//! # stakematch-types
//!
//! Shared types, errors, and configuration for the **StakeMatch** wagering
//! core.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`MatchId`], [`RequestId`], [`PlayerId`], [`TransferId`]
//! - **Match model**: [`Match`], [`MatchStatus`]
//! - **Matchmaking model**: [`MatchRequest`], [`RequestStatus`]
//! - **Leaderboard model**: [`PlayerStats`]
//! - **Lock model**: [`LockRecord`]
//! - **Configuration**: [`MatchmakingConfig`], [`SettlementConfig`]
//! - **Errors**: [`StakematchError`] with `SM_ERR_` prefix codes and the
//!   stable [`ErrorKind`] taxonomy consumed by the API layer
//! - **Constants**: system-wide limits and defaults

pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod leaderboard;
pub mod lock;
pub mod match_record;
pub mod request;

// Re-export all primary types at crate root for ergonomic imports:
//   use stakematch_types::{Match, MatchStatus, MatchRequest, PlayerStats, ...};

pub use config::*;
pub use error::*;
pub use ids::*;
pub use leaderboard::*;
pub use lock::*;
pub use match_record::*;
pub use request::*;

// Constants are accessed via `stakematch_types::constants::FOO`
// (not re-exported to avoid name collisions).
