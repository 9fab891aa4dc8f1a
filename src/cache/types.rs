//! Cache operation error types
//!
//! Every caller-facing operation returns `Result<_, CacheError>`. Remote and
//! channel transport failures are converted in at the adapter boundary; the
//! cache never masks a remote failure by serving a possibly-stale local copy.

use crate::remote::{ChannelError, RemoteError};

/// Error surfaced by cache operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The remote store could not be reached or rejected the call.
    RemoteUnavailable(String),
    /// A remote call exceeded the configured deadline.
    Timeout,
    /// The invalidation channel is down and the operation required it.
    ChannelDisconnected,
    /// Configuration rejected at build time.
    InvalidConfiguration(String),
    /// The coordinator is shutting down.
    ShuttingDown,
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::RemoteUnavailable(msg) => write!(f, "remote store unavailable: {}", msg),
            CacheError::Timeout => write!(f, "remote call timed out"),
            CacheError::ChannelDisconnected => write!(f, "invalidation channel disconnected"),
            CacheError::InvalidConfiguration(msg) => write!(f, "invalid configuration: {}", msg),
            CacheError::ShuttingDown => write!(f, "coordinator is shutting down"),
        }
    }
}

impl std::error::Error for CacheError {}

impl CacheError {
    /// Create a remote-unavailable error.
    #[inline(always)]
    pub fn remote_unavailable(msg: impl Into<String>) -> Self {
        Self::RemoteUnavailable(msg.into())
    }

    /// Create a configuration error.
    #[inline(always)]
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}

impl From<RemoteError> for CacheError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Unavailable(msg) => CacheError::RemoteUnavailable(msg),
            RemoteError::Timeout => CacheError::Timeout,
        }
    }
}

impl From<ChannelError> for CacheError {
    fn from(_: ChannelError) -> Self {
        CacheError::ChannelDisconnected
    }
}
