//! Hashmirror prelude - convenient imports for users
//!
//! Everything needed to build and operate a [`HashMirror`].

// Re-export the public API
pub use crate::hashmirror::{HashMirror, HashMirrorBuilder};

// Essential operation types
pub use crate::cache::entry::FieldValue;
pub use crate::cache::types::CacheError;

// Configuration and observability
pub use crate::cache::config::CacheConfig;
pub use crate::cache::listener::ListenerState;
pub use crate::cache::statistics::CacheStatisticsSnapshot;

// Adapter seams for injecting real or in-process backends
pub use crate::remote::{
    ChannelError, HashGetReply, InvalidationChannel, InvalidationEvent, InvalidationSubscription,
    RemoteError, RemoteStore,
};
