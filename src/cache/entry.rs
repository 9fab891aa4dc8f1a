//! Cached field entries
//!
//! A `FieldEntry` is one locally-held copy of a remote hash field. Entries are
//! always replaced wholesale; value and expiry never change independently.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A cached field payload, or the explicit cached negative.
///
/// `Missing` records that the remote store was consulted and had no value for
/// the field. It is distinct from the field being absent from the cache, which
/// means "unknown, must consult remote".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Value(Arc<[u8]>),
    Missing,
}

impl FieldValue {
    /// Build a value payload from raw bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        FieldValue::Value(Arc::from(bytes.into().into_boxed_slice()))
    }

    /// Payload bytes, or `None` for the cached negative.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Value(bytes) => Some(bytes),
            FieldValue::Missing => None,
        }
    }

    /// Payload as UTF-8, or `None` if missing or not valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// True when this is a real value rather than the cached negative.
    pub fn has_value(&self) -> bool {
        matches!(self, FieldValue::Value(_))
    }

    /// Convert into an optional owned payload.
    pub fn into_option(self) -> Option<Arc<[u8]>> {
        match self {
            FieldValue::Value(bytes) => Some(bytes),
            FieldValue::Missing => None,
        }
    }
}

impl From<Option<Arc<[u8]>>> for FieldValue {
    fn from(opt: Option<Arc<[u8]>>) -> Self {
        match opt {
            Some(bytes) => FieldValue::Value(bytes),
            None => FieldValue::Missing,
        }
    }
}

/// Where a cached entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOrigin {
    /// Populated from a remote fetch or a value-carrying invalidation.
    Remote,
    /// Written through by this process and not yet externally confirmed.
    Local,
}

/// One cached field value with its expiry and access bookkeeping.
#[derive(Debug)]
pub struct FieldEntry {
    pub value: FieldValue,
    /// Absolute local deadline derived from the remote key's TTL at fetch
    /// time. `None` when the remote key had no TTL.
    pub expires_at: Option<Instant>,
    pub origin: EntryOrigin,
    /// Logical access stamp for LRU selection, taken from the cache-wide
    /// access clock.
    last_access: AtomicU64,
}

impl FieldEntry {
    pub fn new(value: FieldValue, expires_at: Option<Instant>, origin: EntryOrigin) -> Self {
        Self {
            value,
            expires_at,
            origin,
            last_access: AtomicU64::new(0),
        }
    }

    /// Record an access at `stamp`.
    pub fn touch(&self, stamp: u64) {
        self.last_access.store(stamp, Ordering::Relaxed);
    }

    pub fn last_access(&self) -> u64 {
        self.last_access.load(Ordering::Relaxed)
    }

    /// Clone of the payload for handing out to callers.
    pub fn value_snapshot(&self) -> FieldValue {
        self.value.clone()
    }
}
