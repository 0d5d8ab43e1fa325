//! # stakematch-store
//!
//! The Ledger Store access contract and its supporting primitives:
//!
//! - [`LedgerStore`]: the key-value + sorted-set trait every component
//!   receives by injection — no ambient global client singletons.
//! - [`MemoryStore`]: the formal in-memory implementation, satisfying the
//!   same ordering and score semantics as a production Redis-style store.
//! - [`keys`]: the key-naming scheme shared by all components.
//! - [`DistributedLock`] / [`LockGuard`]: single-owner mutual exclusion
//!   with a TTL failsafe, used to serialize the expiry sweep.

pub mod keys;
pub mod lock;
pub mod memory;
pub mod store;

pub use lock::{DistributedLock, LockGuard};
pub use memory::MemoryStore;
pub use store::LedgerStore;
