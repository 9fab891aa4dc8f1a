//! In-memory hash field cache
//!
//! Two-level concurrent map: hash key -> field -> entry. Per-field operations
//! are atomic through DashMap entry operations; a concurrent reader observes
//! either the full pre-eviction entry or a clean miss. No cross-field
//! atomicity is provided, fields are logically independent.
//!
//! The whole table sits behind a `trusted` gate. While the invalidation
//! listener is disconnected the table is flushed and the gate closed, so no
//! lookup is served and no population survives; this bounds staleness to the
//! reconnect interval.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use dashmap::DashMap;

use crate::cache::entry::{FieldEntry, FieldValue};
use crate::cache::expiry::ExpiryTracker;
use crate::cache::statistics::CacheStatistics;

/// All field entries cached under one hash key.
#[derive(Debug, Default)]
struct KeySlot {
    fields: DashMap<String, FieldEntry>,
}

/// Process-local store of cached hash fields.
#[derive(Debug)]
pub struct HashFieldCache {
    keys: DashMap<String, KeySlot>,
    /// Closed while the invalidation listener is disconnected.
    trusted: AtomicBool,
    /// Total field entries across all keys, for capacity enforcement.
    field_count: AtomicUsize,
    /// Logical clock driving LRU access stamps.
    access_clock: AtomicU64,
    max_fields: Option<usize>,
    stats: Arc<CacheStatistics>,
}

impl HashFieldCache {
    pub fn new(max_fields: Option<usize>, stats: Arc<CacheStatistics>) -> Self {
        Self {
            keys: DashMap::new(),
            trusted: AtomicBool::new(true),
            field_count: AtomicUsize::new(0),
            access_clock: AtomicU64::new(1),
            max_fields,
            stats,
        }
    }

    /// Expiry-gated lookup. An entry at or past its deadline is removed and
    /// reported as a miss. Returns `None` while the table is untrusted.
    pub fn get(&self, key: &str, field: &str, now: Instant) -> Option<FieldValue> {
        if !self.is_trusted() {
            return None;
        }
        let slot = self.keys.get(key)?;
        let expired = {
            let entry = slot.fields.get(field)?;
            if ExpiryTracker::is_expired(&entry, now) {
                true
            } else {
                entry.touch(self.access_clock.fetch_add(1, Ordering::Relaxed));
                return Some(entry.value_snapshot());
            }
        };
        if expired {
            let removed = slot
                .fields
                .remove_if(field, |_, entry| ExpiryTracker::is_expired(entry, now));
            if removed.is_some() {
                self.field_count.fetch_sub(1, Ordering::Relaxed);
                self.stats.record_evictions(1);
            }
        }
        None
    }

    /// Insert or wholesale-replace the entry for `(key, field)`.
    ///
    /// Ignored while the table is untrusted. The gate is re-checked after the
    /// insert so a population racing a flush cannot outlive it.
    pub fn put(&self, key: &str, field: &str, entry: FieldEntry) {
        if !self.is_trusted() {
            return;
        }
        entry.touch(self.access_clock.fetch_add(1, Ordering::Relaxed));
        let slot = self.keys.entry(key.to_string()).or_default();
        let replaced = slot.fields.insert(field.to_string(), entry);
        drop(slot);
        if replaced.is_none() {
            self.field_count.fetch_add(1, Ordering::Relaxed);
        }
        if !self.is_trusted() {
            self.evict(key, field);
            return;
        }
        self.enforce_capacity(key, field);
    }

    /// Wholesale-replace the entry for `(key, field)` only if one is held.
    ///
    /// Used for value-carrying invalidations: a field this process never read
    /// stays uncached. Returns whether a replacement happened.
    pub fn update_if_present(&self, key: &str, field: &str, entry: FieldEntry) -> bool {
        if !self.is_trusted() {
            return false;
        }
        let Some(slot) = self.keys.get(key) else {
            return false;
        };
        let Some(mut current) = slot.fields.get_mut(field) else {
            return false;
        };
        entry.touch(self.access_clock.fetch_add(1, Ordering::Relaxed));
        *current = entry;
        true
    }

    /// Remove one field entry. Returns true if an entry was present.
    pub fn evict(&self, key: &str, field: &str) -> bool {
        let Some(slot) = self.keys.get(key) else {
            return false;
        };
        let removed = slot.fields.remove(field).is_some();
        drop(slot);
        if removed {
            self.field_count.fetch_sub(1, Ordering::Relaxed);
            self.stats.record_evictions(1);
        }
        self.drop_slot_if_empty(key);
        removed
    }

    /// Remove every field cached under `key`. Returns the number removed.
    pub fn evict_key(&self, key: &str) -> usize {
        let Some((_, slot)) = self.keys.remove(key) else {
            return 0;
        };
        let removed = slot.fields.len();
        if removed > 0 {
            self.field_count.fetch_sub(removed, Ordering::Relaxed);
            self.stats.record_evictions(removed as u64);
        }
        removed
    }

    /// Re-derive the deadline on every entry cached under `key`.
    ///
    /// Entries are replaced as a unit (value and expiry together), never
    /// edited in place.
    pub fn apply_key_expiry(&self, key: &str, deadline: Option<Instant>) {
        let Some(slot) = self.keys.get(key) else {
            return;
        };
        for mut entry in slot.fields.iter_mut() {
            let replacement = FieldEntry::new(entry.value.clone(), deadline, entry.origin);
            replacement.touch(entry.last_access());
            *entry = replacement;
        }
    }

    /// Drop every cached entry.
    pub fn flush(&self) {
        self.keys.clear();
        self.field_count.store(0, Ordering::Relaxed);
        self.stats.record_flush();
    }

    pub fn set_trusted(&self, trusted: bool) {
        self.trusted.store(trusted, Ordering::Release);
    }

    pub fn is_trusted(&self) -> bool {
        self.trusted.load(Ordering::Acquire)
    }

    /// Total cached field entries across all keys.
    pub fn len(&self) -> usize {
        self.field_count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn drop_slot_if_empty(&self, key: &str) {
        self.keys.remove_if(key, |_, slot| slot.fields.is_empty());
    }

    /// Evict least-recently-used entries until the capacity bound holds.
    ///
    /// Full scan over access stamps. Capacity bounds are expected to be
    /// modest and the scan only runs on overflow, never on the hit path.
    /// The just-inserted `(key, field)` is exempt so a put can never evict
    /// its own entry.
    fn enforce_capacity(&self, just_put_key: &str, just_put_field: &str) {
        let Some(max) = self.max_fields else {
            return;
        };
        while self.field_count.load(Ordering::Relaxed) > max {
            let mut oldest: Option<(String, String, u64)> = None;
            for slot in self.keys.iter() {
                for entry in slot.fields.iter() {
                    if slot.key() == just_put_key && entry.key() == just_put_field {
                        continue;
                    }
                    let stamp = entry.last_access();
                    if oldest.as_ref().is_none_or(|(_, _, best)| stamp < *best) {
                        oldest = Some((slot.key().clone(), entry.key().clone(), stamp));
                    }
                }
            }
            match oldest {
                Some((key, field, _)) => {
                    if !self.evict(&key, &field) {
                        break;
                    }
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::EntryOrigin;
    use std::time::Duration;

    fn store(max_fields: Option<usize>) -> HashFieldCache {
        HashFieldCache::new(max_fields, Arc::new(CacheStatistics::new()))
    }

    fn entry(value: &str) -> FieldEntry {
        FieldEntry::new(FieldValue::from_bytes(value), None, EntryOrigin::Remote)
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = store(None);
        cache.put("hashKey", "key1", entry("value1"));
        let got = cache.get("hashKey", "key1", Instant::now()).unwrap();
        assert_eq!(got.as_str(), Some("value1"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn missing_entry_is_a_miss() {
        let cache = store(None);
        assert!(cache.get("hashKey", "key1", Instant::now()).is_none());
    }

    #[test]
    fn cached_negative_is_served() {
        let cache = store(None);
        cache.put(
            "hashKey",
            "gone",
            FieldEntry::new(FieldValue::Missing, None, EntryOrigin::Remote),
        );
        assert_eq!(
            cache.get("hashKey", "gone", Instant::now()),
            Some(FieldValue::Missing)
        );
    }

    #[test]
    fn expired_entry_is_removed_on_lookup() {
        let cache = store(None);
        let now = Instant::now();
        cache.put(
            "hashKey",
            "key1",
            FieldEntry::new(
                FieldValue::from_bytes("value1"),
                Some(now + Duration::from_millis(10)),
                EntryOrigin::Remote,
            ),
        );
        assert!(cache.get("hashKey", "key1", now).is_some());
        assert!(
            cache
                .get("hashKey", "key1", now + Duration::from_millis(10))
                .is_none()
        );
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn evict_key_removes_all_fields() {
        let cache = store(None);
        cache.put("hashKey", "key1", entry("value1"));
        cache.put("hashKey", "key2", entry("value2"));
        cache.put("other", "key1", entry("value3"));
        assert_eq!(cache.evict_key("hashKey"), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("other", "key1", Instant::now()).is_some());
    }

    #[test]
    fn untrusted_table_serves_nothing_and_accepts_nothing() {
        let cache = store(None);
        cache.put("hashKey", "key1", entry("value1"));
        cache.set_trusted(false);
        assert!(cache.get("hashKey", "key1", Instant::now()).is_none());
        cache.put("hashKey", "key2", entry("value2"));
        cache.set_trusted(true);
        assert!(cache.get("hashKey", "key2", Instant::now()).is_none());
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let cache = store(Some(2));
        let now = Instant::now();
        cache.put("hashKey", "a", entry("1"));
        cache.put("hashKey", "b", entry("2"));
        // Refresh "a" so "b" becomes the LRU candidate.
        assert!(cache.get("hashKey", "a", now).is_some());
        cache.put("hashKey", "c", entry("3"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("hashKey", "a", now).is_some());
        assert!(cache.get("hashKey", "b", now).is_none());
        assert!(cache.get("hashKey", "c", now).is_some());
    }

    #[test]
    fn apply_key_expiry_rewrites_deadlines() {
        let cache = store(None);
        let now = Instant::now();
        cache.put("hashKey", "key1", entry("value1"));
        cache.apply_key_expiry("hashKey", Some(now + Duration::from_millis(5)));
        assert!(cache.get("hashKey", "key1", now).is_some());
        assert!(
            cache
                .get("hashKey", "key1", now + Duration::from_millis(5))
                .is_none()
        );
    }
}
