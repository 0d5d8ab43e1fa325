//! The Ledger Store access contract.
//!
//! The core requires only these primitives with standard Redis-like
//! semantics: string get/set/del plus sorted sets in ascending score order
//! with optional reverse. `set_nx` and `compare_and_swap` are the two
//! conditional writes everything else builds on — the lock uses `set_nx`,
//! the registries use `compare_and_swap` for their single-writer discipline.
//!
//! Every method is a potential suspension point in a production store;
//! callers must not hold the distributed lock across unrelated calls.

use stakematch_types::Result;

/// Key-value + sorted-set storage contract.
///
/// Values are opaque strings (the components store JSON payloads). Sorted
/// sets map member strings to `f64` scores, ordered ascending by
/// `(score, member)` — the tie-break keeps range reads deterministic.
pub trait LedgerStore: Send + Sync {
    /// Read a string value.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a string value unconditionally.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Write only if the key is absent. Returns whether the write happened.
    fn set_nx(&self, key: &str, value: &str) -> Result<bool>;

    /// Write only if the current value equals `expected` byte-for-byte.
    /// Returns whether the swap happened.
    fn compare_and_swap(&self, key: &str, expected: &str, value: &str) -> Result<bool>;

    /// Delete a key. Returns whether it existed.
    fn del(&self, key: &str) -> Result<bool>;

    /// Add or update a member's score in a sorted set.
    fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()>;

    /// Members in rank order. `start`/`stop` are inclusive indices; negative
    /// values count from the end (`-1` = last). `rev` flips to descending.
    fn zrange(&self, key: &str, start: i64, stop: i64, rev: bool) -> Result<Vec<String>>;

    /// Remove a member. Returns whether it was present.
    fn zrem(&self, key: &str, member: &str) -> Result<bool>;

    /// A member's score, if present.
    fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>>;

    /// Cardinality of a sorted set.
    fn zcard(&self, key: &str) -> Result<usize>;
}
