//! Key-value cache used for cache-aside reads.
//!
//! Every backend is fail-open: a connection problem turns into a miss (or a
//! `false` from a write) and a `warn!` line, never an error the caller must
//! handle. The relational store stays the only source of truth.

mod disabled;
pub mod keys;
mod memory;
mod redis_cache;
mod stats;

pub use crate::disabled::DisabledCache;
pub use crate::memory::MemoryCache;
pub use crate::redis_cache::RedisCache;
pub use crate::stats::CacheStats;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

pub const DEFAULT_TTL_SECS: u64 = 300;

#[async_trait]
pub trait Cache: Send + Sync {
    /// Raw payload under `key`. `None` on miss, when unavailable, or on error.
    async fn get(&self, key: &str) -> Option<String>;

    /// Store `value` with an expiry. Returns whether the write landed.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> bool;

    async fn delete(&self, key: &str) -> bool;

    /// Remove every key starting with `prefix`.
    async fn delete_by_prefix(&self, prefix: &str) -> bool;

    fn is_available(&self) -> bool;

    fn stats(&self) -> &CacheStats;
}

/// Typed JSON helpers for any [`Cache`].
#[async_trait]
pub trait CacheExt {
    /// Decode the entry under `key`. A payload that does not decode is evicted
    /// and reported as a miss.
    async fn get_json<T: DeserializeOwned + Send>(&self, key: &str) -> Option<T>;

    async fn set_json<T: Serialize + Sync>(&self, key: &str, value: &T, ttl: Duration) -> bool;
}

#[async_trait]
impl<C: Cache + ?Sized> CacheExt for C {
    async fn get_json<T: DeserializeOwned + Send>(&self, key: &str) -> Option<T> {
        let Some(raw) = self.get(key).await else {
            self.stats().record_miss();
            debug!(key, "cache miss");
            return None;
        };
        match serde_json::from_str::<T>(&raw) {
            Ok(value) => {
                self.stats().record_hit();
                debug!(key, "cache hit");
                Some(value)
            }
            Err(err) => {
                warn!(key, %err, "cache entry deserialization failed, evicting");
                self.delete(key).await;
                self.stats().record_miss();
                None
            }
        }
    }

    async fn set_json<T: Serialize + Sync>(&self, key: &str, value: &T, ttl: Duration) -> bool {
        match serde_json::to_string(value) {
            Ok(raw) => self.set(key, &raw, ttl).await,
            Err(err) => {
                warn!(key, %err, "failed to serialize cache entry");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheBackend {
    #[default]
    Redis,
    Memory,
    Disabled,
}

impl CacheBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheBackend::Redis => "redis",
            CacheBackend::Memory => "memory",
            CacheBackend::Disabled => "disabled",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Some(CacheBackend::Redis),
            "memory" => Some(CacheBackend::Memory),
            "disabled" | "none" | "off" => Some(CacheBackend::Disabled),
            _ => None,
        }
    }
}

impl FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s).ok_or_else(|| format!("unknown cache backend: {s}"))
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub redis_url: String,
    pub ttl: Duration,
    pub connect_timeout: Duration,
    pub op_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Redis,
            redis_url: "redis://localhost:6379".into(),
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            connect_timeout: Duration::from_secs(5),
            op_timeout: Duration::from_millis(500),
        }
    }
}

impl CacheConfig {
    /// Set the entry TTL. Values below one second are raised to one.
    pub fn with_ttl_secs(mut self, secs: u64) -> Self {
        self.ttl = Duration::from_secs(secs.max(1));
        self
    }
}

/// Build the configured backend. Never fails: an unreachable Redis yields a
/// cache that reports itself unavailable.
pub async fn connect(config: &CacheConfig) -> Arc<dyn Cache> {
    match config.backend {
        CacheBackend::Redis => Arc::new(RedisCache::connect(config).await),
        CacheBackend::Memory => Arc::new(MemoryCache::new()),
        CacheBackend::Disabled => Arc::new(DisabledCache::new()),
    }
}
