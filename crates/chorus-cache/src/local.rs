//! An in-process [`CacheBus`] over a [`DashMap`], used for the default
//! single-node deployment and for tests.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::trace;

use crate::bus::{CacheBus, CacheResult};
use crate::keys::CacheKey;

struct Entry {
    value: serde_json::Value,
    expires_at: Instant,
}

/// An in-process, sharded TTL cache. Cheap to clone — internally an
/// `Arc`-free `DashMap` shared by reference, matching the `OverlayVfs`
/// convention of keying concurrent structures by a stable string/enum.
#[derive(Default)]
pub struct LocalCacheBus {
    entries: DashMap<CacheKey, Entry>,
}

impl LocalCacheBus {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of entries currently stored, including expired ones not
    /// yet swept by a `get`. Exposed for tests asserting invalidation
    /// fan-out actually removed entries rather than just expiring them.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheBus for LocalCacheBus {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<serde_json::Value>> {
        let Some(entry) = self.entries.get(key) else {
            return Ok(None);
        };
        if Instant::now() >= entry.expires_at {
            drop(entry);
            self.entries.remove(key);
            trace!(%key, "cache entry expired on read");
            return Ok(None);
        }
        Ok(Some(entry.value.clone()))
    }

    async fn set(
        &self,
        key: &CacheKey,
        value: serde_json::Value,
        ttl_secs: u64,
    ) -> CacheResult<()> {
        self.entries.insert(
            key.clone(),
            Entry {
                value,
                expires_at: Instant::now() + Duration::from_secs(ttl_secs),
            },
        );
        Ok(())
    }

    async fn invalidate(&self, key: &CacheKey) -> CacheResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_core::SessionId;
    use serde_json::json;

    #[tokio::test]
    async fn set_then_get_round_trips_value() {
        let cache = LocalCacheBus::new();
        let key = CacheKey::Session(SessionId::new(1));
        cache.set(&key, json!({"title": "hi"}), 60).await.unwrap();
        let got = cache.get(&key).await.unwrap();
        assert_eq!(got, Some(json!({"title": "hi"})));
    }

    #[tokio::test]
    async fn get_on_missing_key_is_none() {
        let cache = LocalCacheBus::new();
        let key = CacheKey::Session(SessionId::new(1));
        assert_eq!(cache.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entry_reads_as_miss_and_is_swept() {
        let cache = LocalCacheBus::new();
        let key = CacheKey::History(SessionId::new(2));
        cache.set(&key, json!([]), 0).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(cache.get(&key).await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache = LocalCacheBus::new();
        let key = CacheKey::Files(SessionId::new(3));
        cache.set(&key, json!([]), 60).await.unwrap();
        cache.invalidate(&key).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn invalidate_many_clears_whole_session_family() {
        let cache = LocalCacheBus::new();
        let id = SessionId::new(4);
        for key in CacheKey::session_family(id) {
            cache.set(&key, json!(null), 60).await.unwrap();
        }
        assert_eq!(cache.len(), 3);
        cache
            .invalidate_many(&CacheKey::session_family(id))
            .await
            .unwrap();
        assert!(cache.is_empty());
    }
}
