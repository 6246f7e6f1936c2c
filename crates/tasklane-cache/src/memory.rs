use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use moka::Expiry;

use crate::{Cache, CacheStats};

const MAX_ENTRIES: u64 = 10_000;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with.
struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process cache backed by `moka`.
///
/// Can be switched off at runtime with [`MemoryCache::set_available`], which
/// makes it behave like an unreachable server.
pub struct MemoryCache {
    inner: MokaCache<String, Entry>,
    available: AtomicBool,
    stats: CacheStats,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            inner: MokaCache::builder()
                .max_capacity(MAX_ENTRIES)
                .expire_after(PerEntryTtl)
                .build(),
            available: AtomicBool::new(true),
            stats: CacheStats::new(),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        if !self.is_available() {
            return None;
        }
        self.inner.get(key).await.map(|entry| entry.value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> bool {
        if !self.is_available() {
            return false;
        }
        let entry = Entry {
            value: value.to_string(),
            ttl,
        };
        self.inner.insert(key.to_string(), entry).await;
        true
    }

    async fn delete(&self, key: &str) -> bool {
        if !self.is_available() {
            return false;
        }
        self.inner.invalidate(key).await;
        true
    }

    async fn delete_by_prefix(&self, prefix: &str) -> bool {
        if !self.is_available() {
            return false;
        }
        let keys: Vec<_> = self
            .inner
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key)
            .collect();
        for key in keys {
            self.inner.invalidate(key.as_str()).await;
        }
        true
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn set_get_delete() {
        let cache = MemoryCache::new();
        assert!(cache.set("task:1", "one", TTL).await);
        assert_eq!(cache.get("task:1").await.as_deref(), Some("one"));

        assert!(cache.set("task:1", "uno", TTL).await);
        assert_eq!(cache.get("task:1").await.as_deref(), Some("uno"));

        assert!(cache.delete("task:1").await);
        assert!(cache.get("task:1").await.is_none());
    }

    #[tokio::test]
    async fn entries_expire_after_their_ttl() {
        let cache = MemoryCache::new();
        cache.set("short", "x", Duration::from_millis(50)).await;
        cache.set("long", "y", TTL).await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(cache.get("short").await.is_none());
        assert_eq!(cache.get("long").await.as_deref(), Some("y"));
    }

    #[tokio::test]
    async fn prefix_delete_leaves_other_keys() {
        let cache = MemoryCache::new();
        cache.set("task:1", "a", TTL).await;
        cache.set("task:all", "b", TTL).await;
        cache.set("session:9", "c", TTL).await;

        assert!(cache.delete_by_prefix("task:").await);
        assert!(cache.get("task:1").await.is_none());
        assert!(cache.get("task:all").await.is_none());
        assert_eq!(cache.get("session:9").await.as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn unavailable_cache_misses_and_rejects_writes() {
        let cache = MemoryCache::new();
        cache.set("task:1", "a", TTL).await;
        cache.set_available(false);

        assert!(!cache.is_available());
        assert!(cache.get("task:1").await.is_none());
        assert!(!cache.set("task:2", "b", TTL).await);
        assert!(!cache.delete_by_prefix("task:").await);

        cache.set_available(true);
        assert_eq!(cache.get("task:1").await.as_deref(), Some("a"));
    }
}
