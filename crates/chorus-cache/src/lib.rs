//! A small TTL key-value cache with invalidation fan-out (spec §4.7,
//! "`DistributedCache`").
//!
//! Modelled as a narrow capability trait — [`CacheBus`] — rather than a
//! concrete store, so the runtime can swap in a real distributed
//! backend (Redis, memcached) without touching call sites; this crate
//! ships the in-process [`LocalCacheBus`] implementation used by the
//! single-node default deployment and by tests.
//!
//! Callers treat every [`CacheBus`] failure as non-fatal: the cache is
//! a performance optimisation, never a source of truth, so a failed
//! `get`/`set`/`invalidate` is logged and the caller falls through to
//! the authoritative store.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bus;
pub mod keys;
pub mod local;

pub use bus::{CacheBus, CacheError, CacheResult};
pub use keys::CacheKey;
pub use local::LocalCacheBus;
