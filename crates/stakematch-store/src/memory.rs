//! In-memory `LedgerStore` implementation.
//!
//! The formal replacement for the original's ad hoc mock client: it
//! satisfies the identical contract as the production store (ascending
//! score order, `(score, member)` tie-break, inclusive negative-index
//! ranges), so the full test suite runs against it unchanged.
//!
//! A single mutex guards both maps, which makes every individual operation
//! atomic — exactly the property `set_nx` and `compare_and_swap` need.

use std::collections::HashMap;
use std::sync::Mutex;

use stakematch_types::{Result, StakematchError};

use crate::store::LedgerStore;

#[derive(Default)]
struct Inner {
    strings: HashMap<String, String>,
    zsets: HashMap<String, HashMap<String, f64>>,
}

/// Thread-safe in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StakematchError::Storage("memory store mutex poisoned".to_string()))
    }
}

/// Resolve a Redis-style inclusive index pair (negative = from the end)
/// into a concrete `[lo, hi)` window over `len` elements, or `None` when
/// the window is empty.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn resolve_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    let lo = (if start < 0 { len + start } else { start }).max(0);
    let hi_incl = (if stop < 0 { len + stop } else { stop }).min(len - 1);
    if lo > hi_incl || lo >= len {
        return None;
    }
    Some((lo as usize, (hi_incl + 1) as usize))
}

impl LedgerStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.strings.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?
            .strings
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn set_nx(&self, key: &str, value: &str) -> Result<bool> {
        let mut inner = self.lock()?;
        if inner.strings.contains_key(key) {
            return Ok(false);
        }
        inner.strings.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    fn compare_and_swap(&self, key: &str, expected: &str, value: &str) -> Result<bool> {
        let mut inner = self.lock()?;
        match inner.strings.get(key) {
            Some(current) if current == expected => {
                inner.strings.insert(key.to_string(), value.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn del(&self, key: &str) -> Result<bool> {
        Ok(self.lock()?.strings.remove(key).is_some())
    }

    fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        self.lock()?
            .zsets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    fn zrange(&self, key: &str, start: i64, stop: i64, rev: bool) -> Result<Vec<String>> {
        let inner = self.lock()?;
        let Some(set) = inner.zsets.get(key) else {
            return Ok(Vec::new());
        };
        let mut members: Vec<(&String, f64)> = set.iter().map(|(m, s)| (m, *s)).collect();
        members.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        if rev {
            members.reverse();
        }

        let Some((lo, hi)) = resolve_range(start, stop, members.len()) else {
            return Ok(Vec::new());
        };
        Ok(members[lo..hi]
            .iter()
            .map(|(m, _)| (*m).clone())
            .collect())
    }

    fn zrem(&self, key: &str, member: &str) -> Result<bool> {
        let mut inner = self.lock()?;
        let Some(set) = inner.zsets.get_mut(key) else {
            return Ok(false);
        };
        let removed = set.remove(member).is_some();
        if set.is_empty() {
            inner.zsets.remove(key);
        }
        Ok(removed)
    }

    fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>> {
        Ok(self
            .lock()?
            .zsets
            .get(key)
            .and_then(|set| set.get(member))
            .copied())
    }

    fn zcard(&self, key: &str) -> Result<usize> {
        Ok(self.lock()?.zsets.get(key).map_or(0, HashMap::len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_set_del() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v".to_string()));
        assert!(store.del("k").unwrap());
        assert!(!store.del("k").unwrap());
    }

    #[test]
    fn set_nx_only_when_absent() {
        let store = MemoryStore::new();
        assert!(store.set_nx("k", "first").unwrap());
        assert!(!store.set_nx("k", "second").unwrap());
        assert_eq!(store.get("k").unwrap(), Some("first".to_string()));
    }

    #[test]
    fn compare_and_swap_detects_conflicts() {
        let store = MemoryStore::new();
        store.set("k", "v1").unwrap();
        assert!(store.compare_and_swap("k", "v1", "v2").unwrap());
        // Stale expectation fails and leaves the value alone.
        assert!(!store.compare_and_swap("k", "v1", "v3").unwrap());
        assert_eq!(store.get("k").unwrap(), Some("v2".to_string()));
        // Absent key never swaps.
        assert!(!store.compare_and_swap("missing", "x", "y").unwrap());
    }

    #[test]
    fn zrange_ascending_by_score() {
        let store = MemoryStore::new();
        store.zadd("z", "c", 3.0).unwrap();
        store.zadd("z", "a", 1.0).unwrap();
        store.zadd("z", "b", 2.0).unwrap();
        assert_eq!(store.zrange("z", 0, -1, false).unwrap(), vec!["a", "b", "c"]);
        assert_eq!(store.zrange("z", 0, -1, true).unwrap(), vec!["c", "b", "a"]);
    }

    #[test]
    fn zrange_member_tiebreak() {
        let store = MemoryStore::new();
        store.zadd("z", "beta", 1.0).unwrap();
        store.zadd("z", "alpha", 1.0).unwrap();
        assert_eq!(
            store.zrange("z", 0, -1, false).unwrap(),
            vec!["alpha", "beta"]
        );
    }

    #[test]
    fn zrange_index_window() {
        let store = MemoryStore::new();
        for (i, m) in ["a", "b", "c", "d"].iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            store.zadd("z", m, i as f64).unwrap();
        }
        assert_eq!(store.zrange("z", 0, 1, false).unwrap(), vec!["a", "b"]);
        assert_eq!(store.zrange("z", 1, 2, false).unwrap(), vec!["b", "c"]);
        assert_eq!(store.zrange("z", -2, -1, false).unwrap(), vec!["c", "d"]);
        assert_eq!(store.zrange("z", 2, 0, false).unwrap(), Vec::<String>::new());
        assert_eq!(store.zrange("z", 10, 20, false).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn zadd_updates_score() {
        let store = MemoryStore::new();
        store.zadd("z", "a", 1.0).unwrap();
        store.zadd("z", "b", 2.0).unwrap();
        store.zadd("z", "a", 3.0).unwrap();
        assert_eq!(store.zscore("z", "a").unwrap(), Some(3.0));
        assert_eq!(store.zrange("z", 0, -1, false).unwrap(), vec!["b", "a"]);
        assert_eq!(store.zcard("z").unwrap(), 2);
    }

    #[test]
    fn zrem_and_empty_set_cleanup() {
        let store = MemoryStore::new();
        store.zadd("z", "a", 1.0).unwrap();
        assert!(store.zrem("z", "a").unwrap());
        assert!(!store.zrem("z", "a").unwrap());
        assert_eq!(store.zcard("z").unwrap(), 0);
        assert_eq!(store.zrange("z", 0, -1, false).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn missing_zset_reads_are_empty() {
        let store = MemoryStore::new();
        assert_eq!(store.zrange("nope", 0, -1, false).unwrap(), Vec::<String>::new());
        assert_eq!(store.zscore("nope", "a").unwrap(), None);
        assert_eq!(store.zcard("nope").unwrap(), 0);
    }

    #[test]
    fn concurrent_set_nx_single_winner() {
        use std::sync::Arc;

        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                store.set_nx("contended", &format!("writer-{i}")).unwrap()
            }));
        }
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
