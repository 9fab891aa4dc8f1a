//! In-process remote store and invalidation channel
//!
//! Faithful enough to the remote model for deterministic tests and examples:
//! hash keys with field tables, key-level TTLs with lazy expiry, broadcast
//! fan-out of invalidation events, and explicit failure injection
//! ([`MemoryRemote::set_available`], [`MemoryChannel::disconnect`]).

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{RwLock, broadcast};

use super::{
    ChannelError, HashGetReply, InvalidationChannel, InvalidationEvent, InvalidationSubscription,
    RemoteError, RemoteStore,
};

/// One remote hash key: its fields and its optional key-level deadline.
#[derive(Debug, Default)]
struct HashState {
    fields: HashMap<String, Arc<[u8]>>,
    expires_at: Option<Instant>,
}

/// In-memory authoritative hash store.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    hashes: DashMap<String, HashState>,
    calls: AtomicU64,
    available: AtomicBool,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self {
            hashes: DashMap::new(),
            calls: AtomicU64::new(0),
            available: AtomicBool::new(true),
        }
    }

    /// Total calls served, across every client of this store.
    pub fn total_calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Simulate the store going down (`false`) or recovering (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    fn check_available(&self) -> Result<(), RemoteError> {
        if self.available.load(Ordering::Acquire) {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(())
        } else {
            Err(RemoteError::Unavailable("store marked unavailable".into()))
        }
    }

    /// Remove `key` if its deadline has passed, mirroring remote lazy expiry.
    fn purge_if_expired(&self, key: &str, now: Instant) {
        self.hashes
            .remove_if(key, |_, state| state.expires_at.is_some_and(|d| d <= now));
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn hash_get(&self, key: &str, fields: &[String]) -> Result<HashGetReply, RemoteError> {
        self.check_available()?;
        let now = Instant::now();
        self.purge_if_expired(key, now);

        let Some(state) = self.hashes.get(key) else {
            return Ok(HashGetReply {
                values: vec![None; fields.len()],
                ttl: None,
            });
        };
        let values = fields
            .iter()
            .map(|field| state.fields.get(field).cloned())
            .collect();
        let ttl = state
            .expires_at
            .map(|deadline| deadline.saturating_duration_since(now));
        Ok(HashGetReply { values, ttl })
    }

    async fn hash_set(&self, key: &str, field: &str, value: &[u8]) -> Result<(), RemoteError> {
        self.check_available()?;
        self.purge_if_expired(key, Instant::now());
        self.hashes
            .entry(key.to_string())
            .or_default()
            .fields
            .insert(field.to_string(), Arc::from(value));
        Ok(())
    }

    async fn hash_delete(&self, key: &str, field: &str) -> Result<bool, RemoteError> {
        self.check_available()?;
        self.purge_if_expired(key, Instant::now());
        let Some(mut state) = self.hashes.get_mut(key) else {
            return Ok(false);
        };
        let removed = state.fields.remove(field).is_some();
        let empty = state.fields.is_empty();
        drop(state);
        if empty {
            // A hash with no fields ceases to exist, as in the remote model.
            self.hashes.remove_if(key, |_, state| state.fields.is_empty());
        }
        Ok(removed)
    }

    async fn key_expire(&self, key: &str, ttl: Duration) -> Result<bool, RemoteError> {
        self.check_available()?;
        let now = Instant::now();
        self.purge_if_expired(key, now);
        match self.hashes.get_mut(key) {
            Some(mut state) => {
                state.expires_at = Some(now + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// In-memory broadcast invalidation transport.
///
/// `disconnect()` swaps the underlying broadcast channel, which kills every
/// live subscription with `ChannelError::Disconnected`; later `subscribe()`
/// calls attach to the replacement channel.
#[derive(Debug)]
pub struct MemoryChannel {
    sender: RwLock<broadcast::Sender<InvalidationEvent>>,
}

impl MemoryChannel {
    const CAPACITY: usize = 1024;

    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(Self::CAPACITY);
        Self {
            sender: RwLock::new(tx),
        }
    }

    /// Kill every live subscription, simulating a transport drop.
    pub async fn disconnect(&self) {
        let (tx, _) = broadcast::channel(Self::CAPACITY);
        *self.sender.write().await = tx;
    }
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InvalidationChannel for MemoryChannel {
    async fn publish(&self, event: InvalidationEvent) -> Result<(), ChannelError> {
        // A send error only means there are no subscribers right now, which
        // is not a publish failure.
        let _ = self.sender.read().await.send(event);
        Ok(())
    }

    async fn subscribe(&self) -> Result<Box<dyn InvalidationSubscription>, ChannelError> {
        let rx = self.sender.read().await.subscribe();
        Ok(Box::new(MemorySubscription { rx }))
    }
}

struct MemorySubscription {
    rx: broadcast::Receiver<InvalidationEvent>,
}

#[async_trait]
impl InvalidationSubscription for MemorySubscription {
    async fn next_event(&mut self) -> Result<InvalidationEvent, ChannelError> {
        match self.rx.recv().await {
            Ok(event) => Ok(event),
            Err(broadcast::error::RecvError::Closed) => Err(ChannelError::Disconnected),
            Err(broadcast::error::RecvError::Lagged(_)) => Err(ChannelError::Lagged),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_get_returns_positionally_aligned_values() {
        let remote = MemoryRemote::new();
        remote.hash_set("hashKey", "key1", b"value1").await.unwrap();
        let reply = remote
            .hash_get("hashKey", &["missing".into(), "key1".into()])
            .await
            .unwrap();
        assert_eq!(reply.values[0], None);
        assert_eq!(reply.values[1].as_deref(), Some(b"value1".as_slice()));
        assert_eq!(reply.ttl, None);
    }

    #[tokio::test]
    async fn expired_key_vanishes() {
        let remote = MemoryRemote::new();
        remote.hash_set("hashKey", "key1", b"value1").await.unwrap();
        assert!(
            remote
                .key_expire("hashKey", Duration::from_millis(20))
                .await
                .unwrap()
        );
        tokio::time::sleep(Duration::from_millis(60)).await;
        let reply = remote.hash_get("hashKey", &["key1".into()]).await.unwrap();
        assert_eq!(reply.values[0], None);
    }

    #[tokio::test]
    async fn deleting_last_field_removes_key() {
        let remote = MemoryRemote::new();
        remote.hash_set("hashKey", "key1", b"value1").await.unwrap();
        assert!(remote.hash_delete("hashKey", "key1").await.unwrap());
        assert!(!remote.hash_delete("hashKey", "key1").await.unwrap());
    }

    #[tokio::test]
    async fn unavailable_store_rejects_calls() {
        let remote = MemoryRemote::new();
        remote.set_available(false);
        assert!(remote.hash_get("hashKey", &["key1".into()]).await.is_err());
        remote.set_available(true);
        assert!(remote.hash_get("hashKey", &["key1".into()]).await.is_ok());
    }

    #[tokio::test]
    async fn disconnect_kills_live_subscriptions() {
        let channel = MemoryChannel::new();
        let mut sub = channel.subscribe().await.unwrap();
        channel.disconnect().await;
        assert!(matches!(
            sub.next_event().await,
            Err(ChannelError::Disconnected)
        ));
    }
}
