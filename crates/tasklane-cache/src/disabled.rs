use std::time::Duration;

use async_trait::async_trait;

use crate::{Cache, CacheStats};

/// A cache that is never available. Every read misses.
#[derive(Debug, Default)]
pub struct DisabledCache {
    stats: CacheStats,
}

impl DisabledCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for DisabledCache {
    async fn get(&self, _key: &str) -> Option<String> {
        None
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> bool {
        false
    }

    async fn delete(&self, _key: &str) -> bool {
        false
    }

    async fn delete_by_prefix(&self, _prefix: &str) -> bool {
        false
    }

    fn is_available(&self) -> bool {
        false
    }

    fn stats(&self) -> &CacheStats {
        &self.stats
    }
}
