//! Cache-aside store for query responses
//!
//! The caching behavior talks to a [`CacheStore`]; [`InMemoryCacheStore`] is
//! the process-local implementation. Values are JSON so any serializable
//! response can be cached.

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Key/value store with per-entry TTL
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Store a value. Last write wins.
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 10_000 }
    }
}

#[derive(Debug, Clone)]
struct CachedEntry {
    value: Value,
    expires_at: Instant,
}

/// In-process cache backed by `DashMap`
#[derive(Debug)]
pub struct InMemoryCacheStore {
    entries: DashMap<String, CachedEntry>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    stats: DashMap<&'static str, usize>,
}

impl InMemoryCacheStore {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            clock,
            stats: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.get_stat("hits"),
            misses: self.get_stat("misses"),
            expirations: self.get_stat("expirations"),
            entries: self.entries.len(),
            max_entries: self.config.capacity,
        }
    }

    /// Drop expired entries first, then up to 10% of capacity
    fn evict(&self) {
        let now = self.clock.now();
        self.entries.retain(|_, entry| entry.expires_at > now);
        if self.entries.len() < self.config.capacity {
            return;
        }

        let to_remove = (self.config.capacity / 10).max(1);
        let mut removed = 0;
        self.entries.retain(|_, _| {
            if removed < to_remove {
                removed += 1;
                false
            } else {
                true
            }
        });
        debug!(removed, "Evicted cache entries at capacity");
    }

    fn increment_stat(&self, key: &'static str) {
        self.stats.entry(key).and_modify(|count| *count += 1).or_insert(1);
    }

    fn get_stat(&self, key: &'static str) -> usize {
        self.stats.get(key).map(|v| *v).unwrap_or(0)
    }
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let now = self.clock.now();
        let lookup = self
            .entries
            .get(key)
            .map(|entry| (entry.expires_at > now).then(|| entry.value.clone()));

        match lookup {
            Some(Some(value)) => {
                self.increment_stat("hits");
                Ok(Some(value))
            }
            Some(None) => {
                // Guard released above; safe to remove
                self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
                self.increment_stat("expirations");
                self.increment_stat("misses");
                Ok(None)
            }
            None => {
                self.increment_stat("misses");
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        if !self.entries.contains_key(key) && self.entries.len() >= self.config.capacity {
            self.evict();
        }

        let entry = CachedEntry {
            value,
            expires_at: self.clock.now() + ttl,
        };
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.clear();
        self.stats.clear();
        Ok(())
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub expirations: usize,
    pub entries: usize,
    pub max_entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
