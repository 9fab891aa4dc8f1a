//! Cache coordinator: read/write orchestration
//!
//! The only component callers interact with. Composes the hash field cache,
//! the expiry tracker and the remote/channel adapters. Reads resolve locally
//! where possible and batch every miss into a single remote round trip;
//! writes go through to the remote first, update local state, and publish an
//! invalidation for every other process.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;
use uuid::Uuid;

use crate::cache::config::CacheConfig;
use crate::cache::entry::{EntryOrigin, FieldEntry, FieldValue};
use crate::cache::expiry::ExpiryTracker;
use crate::cache::statistics::{CacheStatistics, CacheStatisticsSnapshot};
use crate::cache::store::HashFieldCache;
use crate::cache::types::CacheError;
use crate::remote::{HashGetReply, InvalidationChannel, InvalidationEvent, RemoteStore};

/// Orchestrates all cache reads and writes for one process.
pub struct CacheCoordinator {
    remote: Arc<dyn RemoteStore>,
    channel: Arc<dyn InvalidationChannel>,
    store: HashFieldCache,
    tracker: ExpiryTracker,
    stats: Arc<CacheStatistics>,
    config: CacheConfig,
    /// Identifies this coordinator in published events so the listener can
    /// filter its own notifications.
    origin: Uuid,
}

impl CacheCoordinator {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        channel: Arc<dyn InvalidationChannel>,
        config: CacheConfig,
    ) -> Result<Self, CacheError> {
        config.validate()?;
        let stats = Arc::new(CacheStatistics::new());
        Ok(Self {
            remote,
            channel,
            store: HashFieldCache::new(config.max_cached_fields, Arc::clone(&stats)),
            tracker: ExpiryTracker::new(),
            stats,
            config,
            origin: Uuid::new_v4(),
        })
    }

    /// Read one field.
    pub async fn hash_get(&self, key: &str, field: &str) -> Result<FieldValue, CacheError> {
        let mut values = self.hash_get_many(key, &[field]).await?;
        Ok(values.pop().unwrap_or(FieldValue::Missing))
    }

    /// Read several fields, answered in request order with duplicate
    /// occurrences resolved independently.
    ///
    /// Validly cached fields are served locally; all misses of one call are
    /// coalesced into a single batched remote fetch. Cached hits observed
    /// before a fetch are re-validated after it; an entry evicted during the
    /// fetch window is folded into a follow-up fetch iteration, so a stale
    /// value is never returned past its eviction. The fully-cached path has
    /// no suspension point and returns after the first pass.
    pub async fn hash_get_many(
        &self,
        key: &str,
        fields: &[&str],
    ) -> Result<Vec<FieldValue>, CacheError> {
        let mut results: Vec<Option<FieldValue>> = vec![None; fields.len()];
        let mut from_cache = vec![false; fields.len()];

        loop {
            let now = Instant::now();
            let mut hits = 0u64;
            let mut misses = 0u64;
            let mut missing: Vec<String> = Vec::new();

            for (idx, field) in fields.iter().enumerate() {
                if results[idx].is_some() {
                    continue;
                }
                match self.store.get(key, field, now) {
                    Some(value) => {
                        results[idx] = Some(value);
                        from_cache[idx] = true;
                        hits += 1;
                    }
                    None => {
                        misses += 1;
                        if !missing.iter().any(|f| f == field) {
                            missing.push((*field).to_string());
                        }
                    }
                }
            }
            self.stats.record_hits(hits);
            self.stats.record_misses(misses);

            if missing.is_empty() {
                break;
            }

            let reply = self.remote_fetch(key, &missing).await?;
            let deadline = self.tracker.observe_ttl(key, reply.ttl, Instant::now());

            let mut fetched: HashMap<&str, FieldValue> = HashMap::with_capacity(missing.len());
            for (field, value) in missing.iter().zip(reply.values.into_iter()) {
                let value = FieldValue::from(value);
                self.store.put(
                    key,
                    field,
                    FieldEntry::new(value.clone(), deadline, EntryOrigin::Remote),
                );
                fetched.insert(field.as_str(), value);
            }
            for (idx, field) in fields.iter().enumerate() {
                if results[idx].is_none() {
                    if let Some(value) = fetched.get(field) {
                        results[idx] = Some(value.clone());
                        from_cache[idx] = false;
                    }
                }
            }

            // Re-validate every cache-resolved occurrence after the fetch
            // suspension. Fetched values are authoritative and exempt.
            let now = Instant::now();
            let mut invalidated = false;
            for (idx, field) in fields.iter().enumerate() {
                if !from_cache[idx] {
                    continue;
                }
                match self.store.get(key, field, now) {
                    Some(value) => results[idx] = Some(value),
                    None => {
                        results[idx] = None;
                        from_cache[idx] = false;
                        invalidated = true;
                    }
                }
            }
            if !invalidated {
                break;
            }
        }

        Ok(results
            .into_iter()
            .map(|value| value.unwrap_or(FieldValue::Missing))
            .collect())
    }

    /// Write one field through to the remote store.
    ///
    /// The remote is authoritative: it must ack before local state changes.
    /// The local entry is updated before publishing so own-write visibility
    /// holds even if the publish fails.
    pub async fn hash_set(&self, key: &str, field: &str, value: &[u8]) -> Result<(), CacheError> {
        self.stats.record_remote_call();
        self.guard(self.remote.hash_set(key, field, value)).await??;

        let payload: Arc<[u8]> = Arc::from(value);
        self.store.put(
            key,
            field,
            FieldEntry::new(
                FieldValue::Value(Arc::clone(&payload)),
                self.tracker.key_deadline(key),
                EntryOrigin::Local,
            ),
        );
        self.channel
            .publish(InvalidationEvent {
                key: key.to_string(),
                field: field.to_string(),
                value: Some(payload),
                origin: self.origin,
            })
            .await?;
        Ok(())
    }

    /// Delete one field on the remote store. Returns whether it existed.
    ///
    /// The deleting process knows the authoritative outcome, so the negative
    /// is cached locally; everyone else gets a payload-free invalidation.
    pub async fn hash_delete(&self, key: &str, field: &str) -> Result<bool, CacheError> {
        self.stats.record_remote_call();
        let existed = self.guard(self.remote.hash_delete(key, field)).await??;

        self.store.put(
            key,
            field,
            FieldEntry::new(
                FieldValue::Missing,
                self.tracker.key_deadline(key),
                EntryOrigin::Local,
            ),
        );
        self.channel
            .publish(InvalidationEvent {
                key: key.to_string(),
                field: field.to_string(),
                value: None,
                origin: self.origin,
            })
            .await?;
        Ok(existed)
    }

    /// Apply `ttl` to the whole hash key on the remote store, and re-derive
    /// the local deadline for every field cached under it.
    pub async fn key_expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        self.stats.record_remote_call();
        let applied = self.guard(self.remote.key_expire(key, ttl)).await??;
        if applied {
            let deadline = self.tracker.observe_ttl(key, Some(ttl), Instant::now());
            self.store.apply_key_expiry(key, deadline);
        }
        Ok(applied)
    }

    /// Drop every locally cached entry and all TTL bookkeeping.
    pub fn flush(&self) {
        self.store.flush();
        self.tracker.clear();
    }

    /// Monotonic count of remote round trips issued by this coordinator.
    pub fn remote_calls(&self) -> u64 {
        self.stats.remote_calls()
    }

    pub fn statistics(&self) -> CacheStatisticsSnapshot {
        self.stats.snapshot()
    }

    /// Number of field entries currently cached.
    pub fn cached_fields(&self) -> usize {
        self.store.len()
    }

    pub(crate) fn origin(&self) -> Uuid {
        self.origin
    }

    pub(crate) fn channel(&self) -> Arc<dyn InvalidationChannel> {
        Arc::clone(&self.channel)
    }

    pub(crate) fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Listener entry point for one received notification.
    pub(crate) fn handle_invalidation(&self, event: InvalidationEvent) {
        self.stats.record_invalidation_received();
        if event.origin == self.origin {
            // Own write: the local entry was already updated on the write
            // path, evicting it here would cost an avoidable refetch.
            self.stats.record_self_suppressed();
            return;
        }
        match event.value {
            Some(payload) if self.config.apply_invalidation_payloads => {
                let entry = FieldEntry::new(
                    FieldValue::Value(payload),
                    self.tracker.key_deadline(&event.key),
                    EntryOrigin::Remote,
                );
                // Only replace an entry we actually hold; a field this
                // process never read stays uncached.
                if self.store.update_if_present(&event.key, &event.field, entry) {
                    self.stats.record_invalidation_applied();
                }
            }
            _ => {
                self.store.evict(&event.key, &event.field);
            }
        }
    }

    /// Close the table's gate without flushing. Used at listener startup,
    /// before anything has been cached.
    pub(crate) fn suspend_serving(&self) {
        self.store.set_trusted(false);
    }

    /// Listener notifies that its subscription dropped. Missed notifications
    /// mean unbounded staleness, so the whole table is flushed and bypassed.
    pub(crate) fn mark_untrusted(&self) {
        self.store.set_trusted(false);
        self.flush();
    }

    /// Listener notifies that a subscription is live again.
    pub(crate) fn mark_trusted(&self) {
        self.store.set_trusted(true);
    }

    /// One batched fetch, counted and deadline-guarded. A failed or timed-out
    /// fetch populates nothing; a reply of the wrong shape is treated as a
    /// whole-batch failure.
    async fn remote_fetch(&self, key: &str, fields: &[String]) -> Result<HashGetReply, CacheError> {
        self.stats.record_remote_call();
        let reply = self.guard(self.remote.hash_get(key, fields)).await??;
        if reply.values.len() != fields.len() {
            return Err(CacheError::remote_unavailable(format!(
                "batch reply shape mismatch: asked {} fields, got {}",
                fields.len(),
                reply.values.len()
            )));
        }
        Ok(reply)
    }

    /// Apply the configured remote deadline to a remote call.
    async fn guard<T>(
        &self,
        call: impl Future<Output = Result<T, crate::remote::RemoteError>>,
    ) -> Result<Result<T, crate::remote::RemoteError>, CacheError> {
        timeout(self.config.remote_timeout, call)
            .await
            .map_err(|_| CacheError::Timeout)
    }
}

impl std::fmt::Debug for CacheCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheCoordinator")
            .field("origin", &self.origin)
            .field("cached_fields", &self.store.len())
            .field("trusted", &self.store.is_trusted())
            .finish_non_exhaustive()
    }
}
