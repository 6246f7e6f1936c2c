use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisResult};
use tracing::{info, warn};

use crate::{Cache, CacheConfig, CacheStats};

const SCAN_BATCH: usize = 100;

/// Redis-backed cache.
///
/// The connection is established once by [`RedisCache::connect`]. If that
/// fails the cache stays unavailable for the life of the process. Once
/// connected, the `ConnectionManager` reconnects on its own and availability
/// follows the outcome of the most recent operation.
pub struct RedisCache {
    manager: Option<ConnectionManager>,
    available: AtomicBool,
    op_timeout: Duration,
    stats: CacheStats,
}

impl RedisCache {
    pub async fn connect(config: &CacheConfig) -> Self {
        let manager = match open_manager(config).await {
            Ok(manager) => {
                info!(url = %config.redis_url, "connected to redis");
                Some(manager)
            }
            Err(err) => {
                warn!(url = %config.redis_url, error = %err, "redis unavailable, caching disabled");
                None
            }
        };
        Self {
            available: AtomicBool::new(manager.is_some()),
            manager,
            op_timeout: config.op_timeout,
            stats: CacheStats::new(),
        }
    }

    /// Run one command with the per-operation timeout, recording availability.
    async fn run<T, F, Fut>(&self, op: &'static str, key: &str, f: F) -> Option<T>
    where
        F: FnOnce(ConnectionManager) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let conn = self.manager.clone()?;
        match tokio::time::timeout(self.op_timeout, f(conn)).await {
            Ok(Ok(value)) => {
                if !self.available.swap(true, Ordering::Relaxed) {
                    info!("redis connection restored");
                }
                Some(value)
            }
            Ok(Err(err)) => {
                warn!(op, key, error = %err, "redis command failed");
                self.available.store(false, Ordering::Relaxed);
                None
            }
            Err(_) => {
                warn!(op, key, timeout_ms = self.op_timeout.as_millis() as u64, "redis command timed out");
                self.available.store(false, Ordering::Relaxed);
                None
            }
        }
    }
}

async fn open_manager(config: &CacheConfig) -> Result<ConnectionManager, String> {
    let client = redis::Client::open(config.redis_url.as_str()).map_err(|e| e.to_string())?;
    match tokio::time::timeout(config.connect_timeout, client.get_connection_manager()).await {
        Ok(Ok(manager)) => Ok(manager),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!(
            "connect timed out after {}ms",
            config.connect_timeout.as_millis()
        )),
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Option<String> {
        self.run("get", key, |mut conn| async move {
            conn.get::<_, Option<String>>(key).await
        })
        .await
        .flatten()
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> bool {
        let seconds = ttl.as_secs().max(1);
        self.run("set", key, |mut conn| async move {
            conn.set_ex::<_, _, ()>(key, value, seconds).await
        })
        .await
        .is_some()
    }

    async fn delete(&self, key: &str) -> bool {
        self.run("del", key, |mut conn| async move { conn.del::<_, ()>(key).await })
            .await
            .is_some()
    }

    async fn delete_by_prefix(&self, prefix: &str) -> bool {
        let pattern = format!("{prefix}*");
        self.run("scan_del", prefix, |mut conn| async move {
            let mut cursor: u64 = 0;
            loop {
                let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(SCAN_BATCH)
                    .query_async(&mut conn)
                    .await?;
                if !keys.is_empty() {
                    conn.del::<_, ()>(keys).await?;
                }
                if next == 0 {
                    return Ok(());
                }
                cursor = next;
            }
        })
        .await
        .is_some()
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    fn stats(&self) -> &CacheStats {
        &self.stats
    }
}
