//! Expiry tracking for locally cached entries
//!
//! The remote store ties TTLs to whole hash keys, not to individual fields.
//! The tracker records the last TTL observed for each key (from a fetch reply
//! or a locally issued expire command) as an absolute local deadline, and
//! gates every lookup on it. Expiry is lazy: an entry at or past its deadline
//! is treated as a miss and removed at read time. A TTL is never extended by
//! a read.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::cache::entry::FieldEntry;

/// Per-key TTL bookkeeping shared by the coordinator and the store.
#[derive(Debug, Default)]
pub struct ExpiryTracker {
    /// Last-observed absolute deadline per hash key.
    key_deadlines: DashMap<String, Instant>,
}

impl ExpiryTracker {
    pub fn new() -> Self {
        Self {
            key_deadlines: DashMap::new(),
        }
    }

    /// Convert a remote TTL into an absolute local deadline.
    pub fn derive_local_expiry(ttl: Option<Duration>, now: Instant) -> Option<Instant> {
        ttl.map(|ttl| now + ttl)
    }

    /// Record the TTL observed for `key` and return the derived deadline.
    ///
    /// `None` means the remote key has no TTL; any previously recorded
    /// deadline is cleared, matching the remote PERSIST semantics.
    pub fn observe_ttl(&self, key: &str, ttl: Option<Duration>, now: Instant) -> Option<Instant> {
        match Self::derive_local_expiry(ttl, now) {
            Some(deadline) => {
                self.key_deadlines.insert(key.to_string(), deadline);
                Some(deadline)
            }
            None => {
                self.key_deadlines.remove(key);
                None
            }
        }
    }

    /// Last-known deadline for `key`, if a TTL has been observed.
    pub fn key_deadline(&self, key: &str) -> Option<Instant> {
        self.key_deadlines.get(key).map(|deadline| *deadline)
    }

    /// Whether `entry` is past its own deadline at `now`.
    pub fn is_expired(entry: &FieldEntry, now: Instant) -> bool {
        entry.expires_at.is_some_and(|deadline| deadline <= now)
    }

    /// Drop the recorded deadline for `key`.
    pub fn forget_key(&self, key: &str) {
        self.key_deadlines.remove(key);
    }

    /// Drop all recorded deadlines.
    pub fn clear(&self) {
        self.key_deadlines.clear();
    }
}
