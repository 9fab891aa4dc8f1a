//! Hashmirror - process-local cache for a remote hash store
//!
//! A read cache that mirrors a subset of a remote hash-oriented key-value
//! store and keeps itself coherent across independent client processes
//! through change notifications instead of polling.
//!
//! # Features
//!
//! - **Field-granular caching**: entries are keyed by (hash key, field), so
//!   partial hits fetch only the fields that are actually missing
//! - **Batched misses**: a multi-field read issues at most one remote round
//!   trip, however many fields are uncached
//! - **Write-through with own-write visibility**: the remote store acks
//!   before local state changes; the writer trusts its own write immediately
//! - **Invalidation-driven coherence**: a background listener evicts entries
//!   changed by other processes, with self-originated events filtered out
//! - **TTL synchronization**: remote key TTLs become absolute local deadlines
//!   checked lazily on every lookup, so data is never served past its
//!   last-known expiry
//! - **Bounded staleness on disconnect**: a lost subscription flushes the
//!   cache and bypasses it until the listener is resubscribed
//!
//! The remote store is always authoritative; every local entry is a
//! transient, possibly-stale copy of it.

// Public API modules
pub mod hashmirror;
pub mod prelude;

// Cache implementation modules - adapter traits are public for user backends
pub mod cache;
pub mod remote;

// Re-export the public API at the crate root for convenience
pub use hashmirror::{HashMirror, HashMirrorBuilder};
pub use prelude::*;
