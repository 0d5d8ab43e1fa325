//! # stakematch-matchcore
//!
//! The match lifecycle core:
//!
//! - [`MatchRegistry`]: exclusive owner of match records — creation, join,
//!   state transitions, persistence round-trips with optimistic
//!   concurrency.
//! - [`MatchmakingQueue`]: per-wager-tier FIFO pool pairing compatible
//!   players into an active match.
//! - [`ExpirySweeper`]: lock-gated periodic job expiring stale requests
//!   and pending matches.
//!
//! All three receive the Ledger Store by injection and linearize per-entity
//! writes through compare-and-swap on record versions.

pub mod queue;
pub mod registry;
pub mod sweeper;

pub use queue::{MatchmakingQueue, SubmitOutcome};
pub use registry::MatchRegistry;
pub use sweeper::{ExpirySweeper, SweepRecord};
