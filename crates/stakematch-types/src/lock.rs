//! Lock record for the distributed mutual-exclusion primitive.
//!
//! Exists only while a mutually-exclusive maintenance task (the expiry
//! sweeper) runs. The record carries its own expiry so a crashed holder
//! cannot deadlock the system: a later caller observes the stale record and
//! takes the lock over.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The value stored under a lock key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Unique owner token. Release succeeds only when the stored token
    /// matches the releasing caller's.
    pub token: String,
    /// Failsafe expiry. Past this instant any caller may take the lock over.
    pub expires_at: DateTime<Utc>,
}

impl LockRecord {
    /// Mint a record with a fresh owner token.
    #[must_use]
    pub fn new(ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            token: Uuid::now_v7().to_string(),
            expires_at: now + ttl,
        }
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique() {
        let now = Utc::now();
        let a = LockRecord::new(Duration::seconds(60), now);
        let b = LockRecord::new(Duration::seconds(60), now);
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn expiry_is_ttl_from_now() {
        let now = Utc::now();
        let rec = LockRecord::new(Duration::seconds(60), now);
        assert!(!rec.is_expired(now + Duration::seconds(59)));
        assert!(rec.is_expired(now + Duration::seconds(61)));
    }

    #[test]
    fn serde_roundtrip() {
        let rec = LockRecord::new(Duration::seconds(60), Utc::now());
        let json = serde_json::to_string(&rec).unwrap();
        let back: LockRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(rec, back);
    }
}
