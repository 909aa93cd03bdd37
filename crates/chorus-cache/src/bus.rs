//! The [`CacheBus`] capability trait.

use async_trait::async_trait;
use thiserror::Error;

use crate::keys::CacheKey;

/// Errors a [`CacheBus`] implementation can report. Per the resolved
/// Open Question on cache-layer failure handling, every call site logs
/// and continues rather than propagating these — the enum exists so
/// implementations have somewhere to put transport-level detail for
/// that log line.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backing store is unreachable (connection refused, timeout).
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    /// The stored value could not be decoded back into the requested type.
    #[error("cache entry corrupt: {0}")]
    Corrupt(String),
}

/// Result type for [`CacheBus`] operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// A TTL key-value cache with single-key invalidation, fronting the
/// `session:{id}` / `history:{id}` / `files:{id}` / `auth:token:{t}`
/// key families (spec §4.7).
///
/// Implementations do not need to support partial updates: entries are
/// always replaced wholesale and invalidated wholesale. Callers that
/// mutate a session should invalidate the whole
/// [`CacheKey::session_family`] rather than a single key, so a stale
/// `history` entry can never outlive a refreshed `session` entry.
#[async_trait]
pub trait CacheBus: Send + Sync {
    /// Fetch a cached JSON value, if present and unexpired.
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<serde_json::Value>>;

    /// Store a JSON value under `key`, replacing any existing entry,
    /// expiring after `ttl_secs` seconds.
    async fn set(&self, key: &CacheKey, value: serde_json::Value, ttl_secs: u64) -> CacheResult<()>;

    /// Remove a single cached entry, if present.
    async fn invalidate(&self, key: &CacheKey) -> CacheResult<()>;

    /// Remove every cached entry named by `keys`. The default
    /// implementation invalidates each key in turn; a real distributed
    /// backend may override this with a single pipelined call.
    async fn invalidate_many(&self, keys: &[CacheKey]) -> CacheResult<()> {
        for key in keys {
            self.invalidate(key).await?;
        }
        Ok(())
    }
}
