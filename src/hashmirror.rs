//! Public API for the hashmirror cache
//!
//! `HashMirror` is a cheaply-cloneable handle over one shared coordinator and
//! one background invalidation listener. All clones see the same cache, the
//! same adapter connections and the same statistics.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};

use crate::cache::config::CacheConfig;
use crate::cache::coordinator::CacheCoordinator;
use crate::cache::entry::FieldValue;
use crate::cache::listener::{InvalidationListener, ListenerHandle, ListenerState};
use crate::cache::statistics::CacheStatisticsSnapshot;
use crate::cache::types::CacheError;
use crate::remote::{InvalidationChannel, RemoteStore};

/// Process-local, invalidation-coherent read cache over a remote hash store.
///
/// Reads are served from local memory where validly cached, with all misses
/// of one call coalesced into a single batched remote fetch. Writes go
/// through to the remote store first, then update local state and broadcast
/// an invalidation to every other process.
#[derive(Clone)]
pub struct HashMirror {
    coordinator: Arc<CacheCoordinator>,
    listener: Arc<Mutex<Option<ListenerHandle>>>,
    listener_state: watch::Receiver<ListenerState>,
}

impl HashMirror {
    /// Create a new builder with fluent configuration.
    pub fn builder() -> HashMirrorBuilder {
        HashMirrorBuilder::new()
    }

    /// Read one field: the cached copy if validly held, otherwise fetched
    /// from the remote store and cached.
    pub async fn hash_get(&self, key: &str, field: &str) -> Result<FieldValue, CacheError> {
        self.coordinator.hash_get(key, field).await
    }

    /// Read several fields, answered in request order.
    ///
    /// If every field is validly cached, no remote call is issued; otherwise
    /// exactly one batched fetch serves all misses together.
    pub async fn hash_get_many(
        &self,
        key: &str,
        fields: &[&str],
    ) -> Result<Vec<FieldValue>, CacheError> {
        self.coordinator.hash_get_many(key, fields).await
    }

    /// Write one field through to the remote store. The write is immediately
    /// visible to this process's own reads; other processes converge once
    /// the published invalidation reaches them.
    pub async fn hash_set(
        &self,
        key: &str,
        field: &str,
        value: impl AsRef<[u8]>,
    ) -> Result<(), CacheError> {
        self.coordinator.hash_set(key, field, value.as_ref()).await
    }

    /// Delete one field on the remote store. Returns whether it existed.
    pub async fn hash_delete(&self, key: &str, field: &str) -> Result<bool, CacheError> {
        self.coordinator.hash_delete(key, field).await
    }

    /// Apply `ttl` to the whole remote hash key and to every field cached
    /// under it locally. Returns whether the key existed.
    pub async fn key_expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        self.coordinator.key_expire(key, ttl).await
    }

    /// Drop every locally cached entry.
    pub fn flush(&self) {
        self.coordinator.flush();
    }

    /// Monotonic count of remote round trips issued through this cache.
    pub fn remote_calls(&self) -> u64 {
        self.coordinator.remote_calls()
    }

    pub fn statistics(&self) -> CacheStatisticsSnapshot {
        self.coordinator.statistics()
    }

    /// Number of field entries currently cached.
    pub fn cached_fields(&self) -> usize {
        self.coordinator.cached_fields()
    }

    /// Current state of the invalidation subscription.
    pub fn listener_state(&self) -> ListenerState {
        *self.listener_state.borrow()
    }

    /// Stop the invalidation listener and wait for it to finish.
    ///
    /// The cache suspends serving from local memory: without a subscription,
    /// staleness would be unbounded. Reads and writes keep working against
    /// the remote store directly.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.listener.lock().await.take() {
            self.coordinator.suspend_serving();
            handle.shutdown().await;
        }
    }
}

impl std::fmt::Debug for HashMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashMirror")
            .field("coordinator", &self.coordinator)
            .field("listener_state", &self.listener_state())
            .finish()
    }
}

/// Fluent builder for [`HashMirror`].
pub struct HashMirrorBuilder {
    remote: Option<Arc<dyn RemoteStore>>,
    channel: Option<Arc<dyn InvalidationChannel>>,
    config: CacheConfig,
}

impl HashMirrorBuilder {
    pub fn new() -> Self {
        Self {
            remote: None,
            channel: None,
            config: CacheConfig::default(),
        }
    }

    /// The authoritative remote store adapter (required).
    pub fn remote_store(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// The invalidation transport adapter (required).
    pub fn invalidation_channel(mut self, channel: Arc<dyn InvalidationChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Bound the number of locally cached field entries; least-recently-used
    /// entries are evicted past the bound.
    pub fn max_cached_fields(mut self, max: usize) -> Self {
        self.config.max_cached_fields = Some(max);
        self
    }

    /// Deadline applied to every remote call.
    pub fn remote_timeout(mut self, timeout: Duration) -> Self {
        self.config.remote_timeout = timeout;
        self
    }

    /// Initial and maximum resubscribe backoff after a channel disconnect.
    pub fn reconnect_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.config.reconnect_backoff = initial;
        self.config.reconnect_backoff_max = max;
        self
    }

    /// Whether value-carrying invalidations replace cached entries in place
    /// instead of evicting them.
    pub fn apply_invalidation_payloads(mut self, apply: bool) -> Self {
        self.config.apply_invalidation_payloads = apply;
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the cache and start its invalidation listener.
    ///
    /// Completes once the first subscription is live, so a read issued right
    /// after `build` already caches. Requires a running tokio runtime.
    pub async fn build(self) -> Result<HashMirror, CacheError> {
        let remote = self
            .remote
            .ok_or_else(|| CacheError::invalid_configuration("remote store adapter is required"))?;
        let channel = self.channel.ok_or_else(|| {
            CacheError::invalid_configuration("invalidation channel adapter is required")
        })?;

        let coordinator = Arc::new(CacheCoordinator::new(remote, channel, self.config)?);
        let handle = InvalidationListener::spawn(Arc::clone(&coordinator));
        handle.wait_for(ListenerState::Subscribed).await;
        let listener_state = handle.state_receiver();

        Ok(HashMirror {
            coordinator,
            listener: Arc::new(Mutex::new(Some(handle))),
            listener_state,
        })
    }
}

impl Default for HashMirrorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
