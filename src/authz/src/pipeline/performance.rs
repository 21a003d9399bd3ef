//! Performance behavior

use super::{Next, PipelineBehavior};
use crate::error::Result;
use crate::metrics::MetricsCollector;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Reports requests slower than a threshold. Never changes the outcome.
pub struct PerformanceBehavior {
    threshold: Duration,
    metrics: Option<Arc<MetricsCollector>>,
}

impl PerformanceBehavior {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

#[async_trait]
impl PipelineBehavior for PerformanceBehavior {
    fn name(&self) -> &'static str {
        "performance"
    }

    async fn handle(&self, next: Next<'_>) -> Result<Value> {
        let request = next.request().name();
        let user_id = next.ctx().user_id();
        let start = Instant::now();

        let result = next.run().await;
        let elapsed = start.elapsed();

        if elapsed > self.threshold {
            warn!(
                request,
                elapsed_ms = elapsed.as_millis() as u64,
                threshold_ms = self.threshold.as_millis() as u64,
                user_id = ?user_id,
                "Long running request"
            );
            if let Some(metrics) = &self.metrics {
                metrics.record_slow_request().await;
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_request(elapsed, result.is_ok()).await;
        }

        result
    }
}
