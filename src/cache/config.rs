//! Coordinator configuration
//!
//! Defaults are tuned for a local-network remote store: generous remote
//! timeout, fast reconnect backoff, no capacity bound.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::types::CacheError;

/// Configuration for a [`CacheCoordinator`](crate::cache::coordinator::CacheCoordinator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Upper bound on locally cached field entries across all hash keys.
    /// `None` disables capacity eviction. When exceeded, the
    /// least-recently-used entry is evicted.
    pub max_cached_fields: Option<usize>,
    /// Deadline applied to every remote store call.
    pub remote_timeout: Duration,
    /// Initial delay before resubscribing after a channel disconnect.
    pub reconnect_backoff: Duration,
    /// Backoff ceiling; the delay doubles per failed attempt up to this.
    pub reconnect_backoff_max: Duration,
    /// Apply value-carrying invalidations in place instead of evicting.
    /// Disable for transports that strip payloads.
    pub apply_invalidation_payloads: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cached_fields: None,
            remote_timeout: Duration::from_secs(5),
            reconnect_backoff: Duration::from_millis(50),
            reconnect_backoff_max: Duration::from_secs(5),
            apply_invalidation_payloads: true,
        }
    }
}

impl CacheConfig {
    /// Validate invariants that the builder cannot express in types.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.remote_timeout.is_zero() {
            return Err(CacheError::invalid_configuration(
                "remote_timeout must be non-zero",
            ));
        }
        if self.reconnect_backoff.is_zero() {
            return Err(CacheError::invalid_configuration(
                "reconnect_backoff must be non-zero",
            ));
        }
        if self.reconnect_backoff_max < self.reconnect_backoff {
            return Err(CacheError::invalid_configuration(
                "reconnect_backoff_max must be >= reconnect_backoff",
            ));
        }
        if self.max_cached_fields == Some(0) {
            return Err(CacheError::invalid_configuration(
                "max_cached_fields must be at least 1 when set",
            ));
        }
        Ok(())
    }
}
