//! # stakematch-settlement
//!
//! The payout plane: turns an `active` match plus a winner into exactly one
//! executed transfer and a `completed` match record.
//!
//! - [`FeeSchedule`]: basis-point fee math over the two-stake pot.
//! - [`TransferNetwork`]: the seam to the value-transfer network, with
//!   [`MemoryNetwork`] as a scriptable in-process double.
//! - [`SettlementEngine`]: the idempotent settle flow — escrow check,
//!   handle acquisition with bounded retry, submit, confirm, then the
//!   atomic completion write.
//! - [`Leaderboard`]: per-player win/loss records and ranked indexes,
//!   updated after every settlement.

pub mod engine;
pub mod fees;
pub mod leaderboard;
pub mod network;

pub use engine::{Settlement, SettlementEngine};
pub use fees::FeeSchedule;
pub use leaderboard::Leaderboard;
pub use network::{ConfirmStatus, MemoryNetwork, TransferHandle, TransferNetwork, TransferRequest};
