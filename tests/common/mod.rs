//! Shared harness: one in-process remote store and channel, a cache under
//! test, and helpers for seeding the store directly or acting as a second
//! client process.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use hashmirror::remote::memory::{MemoryChannel, MemoryRemote};
use hashmirror::{HashMirror, HashMirrorBuilder};

/// Upper bound on invalidation propagation in tests. Notifications normally
/// land within a few milliseconds; this leaves slack for busy CI machines.
pub const PROPAGATION_DELAY: Duration = Duration::from_millis(80);

pub struct Harness {
    /// Direct handle to the authoritative store, bypassing every cache.
    pub remote: Arc<MemoryRemote>,
    pub channel: Arc<MemoryChannel>,
    /// The cache under test.
    pub mirror: HashMirror,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_builder(|builder| builder).await
    }

    pub async fn with_builder(
        configure: impl FnOnce(HashMirrorBuilder) -> HashMirrorBuilder,
    ) -> Self {
        let remote = Arc::new(MemoryRemote::new());
        let channel = Arc::new(MemoryChannel::new());
        let builder = HashMirror::builder()
            .remote_store(remote.clone())
            .invalidation_channel(channel.clone())
            .reconnect_backoff(Duration::from_millis(10), Duration::from_millis(100));
        let mirror = configure(builder).build().await.expect("build mirror");
        Self {
            remote,
            channel,
            mirror,
        }
    }

    /// Seed the store directly, as an external writer with no cache attached.
    pub async fn seed(&self, key: &str, field: &str, value: &str) {
        use hashmirror::RemoteStore;
        self.remote
            .hash_set(key, field, value.as_bytes())
            .await
            .expect("seed remote");
    }

    /// A second caching client sharing the same store and channel, standing
    /// in for another process.
    pub async fn other_client(&self) -> HashMirror {
        HashMirror::builder()
            .remote_store(self.remote.clone())
            .invalidation_channel(self.channel.clone())
            .reconnect_backoff(Duration::from_millis(10), Duration::from_millis(100))
            .build()
            .await
            .expect("build other client")
    }

    /// Wait out the cross-process propagation window.
    pub async fn propagate(&self) {
        tokio::time::sleep(PROPAGATION_DELAY).await;
    }
}

/// Convenience: the UTF-8 payload of a read, panicking on a missing value.
pub fn text(value: &hashmirror::FieldValue) -> &str {
    value.as_str().expect("expected a value")
}
