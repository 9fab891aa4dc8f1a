//! Adapter seams for the authoritative remote store and the invalidation
//! transport
//!
//! The coordinator only ever talks to these traits, so tests and examples can
//! inject in-process implementations ([`memory`]) and a production build can
//! inject a real client. Both connections are process-wide and shared across
//! concurrent callers.

pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

/// Transport-level failure talking to the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Connection failed or the store rejected the call.
    Unavailable(String),
    /// The adapter's own deadline elapsed.
    Timeout,
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteError::Unavailable(msg) => write!(f, "remote unavailable: {}", msg),
            RemoteError::Timeout => write!(f, "remote call timed out"),
        }
    }
}

impl std::error::Error for RemoteError {}

/// Failure of an invalidation subscription's transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The subscription's connection dropped; it must be re-established.
    Disconnected,
    /// The subscriber fell behind and notifications were lost. Equivalent to
    /// a disconnect for coherence purposes: missed evictions mean the local
    /// cache can no longer be trusted.
    Lagged,
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelError::Disconnected => write!(f, "invalidation channel disconnected"),
            ChannelError::Lagged => write!(f, "invalidation subscriber lagged"),
        }
    }
}

impl std::error::Error for ChannelError {}

/// Reply to a batched hash fetch.
///
/// `values` is positionally aligned with the requested fields; `None` is the
/// remote's "no value" for that field. `ttl` is the key's remaining TTL at
/// fetch time, `None` when the key has no TTL, so expiry derivation needs no
/// second round trip.
#[derive(Debug, Clone)]
pub struct HashGetReply {
    pub values: Vec<Option<Arc<[u8]>>>,
    pub ttl: Option<Duration>,
}

/// One change notification: some writer touched `(key, field)`.
///
/// `value` optionally carries the new payload so receivers can repopulate
/// without a round trip; deletions publish no payload and receivers evict.
/// `origin` identifies the publishing coordinator so it can filter its own
/// notifications.
#[derive(Debug, Clone)]
pub struct InvalidationEvent {
    pub key: String,
    pub field: String,
    pub value: Option<Arc<[u8]>>,
    pub origin: Uuid,
}

/// Synchronous-batched access to the authoritative hash store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch `fields` of `key` in a single round trip.
    async fn hash_get(&self, key: &str, fields: &[String]) -> Result<HashGetReply, RemoteError>;

    /// Set one field. The store is authoritative once this acks.
    async fn hash_set(&self, key: &str, field: &str, value: &[u8]) -> Result<(), RemoteError>;

    /// Delete one field. Returns whether it existed.
    async fn hash_delete(&self, key: &str, field: &str) -> Result<bool, RemoteError>;

    /// Apply `ttl` to the whole hash key. Returns whether the key existed.
    async fn key_expire(&self, key: &str, ttl: Duration) -> Result<bool, RemoteError>;
}

/// Publish/subscribe transport for change notifications.
#[async_trait]
pub trait InvalidationChannel: Send + Sync {
    /// Broadcast `event` to every subscriber, including this process's own.
    /// Delivery is at-least-once and unordered across keys.
    async fn publish(&self, event: InvalidationEvent) -> Result<(), ChannelError>;

    /// Open a new subscription. Infinite; not restartable after an error,
    /// re-subscribe instead.
    async fn subscribe(&self) -> Result<Box<dyn InvalidationSubscription>, ChannelError>;
}

/// A live subscription's pull side.
#[async_trait]
pub trait InvalidationSubscription: Send {
    /// Wait for the next notification. An error means the subscription is
    /// dead and a new one must be opened.
    async fn next_event(&mut self) -> Result<InvalidationEvent, ChannelError>;
}
