//! Cache-aside behavior for queries

use super::{Next, PipelineBehavior};
use crate::cache::CacheStore;
use crate::error::Result;
use crate::metrics::MetricsCollector;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Serves opted-in queries from the cache store.
///
/// Concurrent misses for the same key may each reach the handler; the last
/// write wins. Store failures degrade to a miss.
pub struct CachingBehavior {
    cache: Arc<dyn CacheStore>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl CachingBehavior {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self { cache, metrics: None }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

#[async_trait]
impl PipelineBehavior for CachingBehavior {
    fn name(&self) -> &'static str {
        "caching"
    }

    async fn handle(&self, next: Next<'_>) -> Result<Value> {
        let request = next.request();
        let Some(query) = request.as_cacheable() else {
            return next.run().await;
        };

        if query.bypass_cache() {
            debug!(request = request.name(), "Cache bypassed");
            return next.run().await;
        }

        let key = format!("{}:{}", request.name(), query.cache_key());

        match self.cache.get(&key).await {
            Ok(Some(value)) => {
                debug!(key = %key, "Cache hit");
                if let Some(metrics) = &self.metrics {
                    metrics.record_cache_hit().await;
                }
                return Ok(value);
            }
            Ok(None) => debug!(key = %key, "Cache miss"),
            Err(e) => warn!(key = %key, error = %e, "Cache read failed, treating as miss"),
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_cache_miss().await;
        }

        let value = next.run().await?;

        if let Err(e) = self.cache.set(&key, value.clone(), query.cache_duration()).await {
            warn!(key = %key, error = %e, "Cache write failed");
        }

        Ok(value)
    }
}
