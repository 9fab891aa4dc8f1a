//! Cache engine internals
//!
//! The coordinator composes the store, the expiry tracker and the adapter
//! seams; the invalidation listener runs beside them and feeds evictions
//! back into the store. Callers go through the
//! [`HashMirror`](crate::HashMirror) facade.

pub mod config;
pub mod coordinator;
pub mod entry;
pub mod expiry;
pub mod listener;
pub mod statistics;
pub mod store;
pub mod types;
