//! Pipeline and rate limiter metrics with Prometheus text export

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Snapshot of pipeline counters
#[derive(Debug, Clone, Default)]
pub struct PipelineMetrics {
    /// Requests that reached the pipeline
    pub total_requests: u64,

    /// Requests whose handler or behaviors failed (denials excluded)
    pub failed_requests: u64,

    /// Authorization denials (401/403)
    pub denied_requests: u64,

    pub cache_hits: u64,
    pub cache_misses: u64,

    /// Requests slower than the configured threshold
    pub slow_requests: u64,

    /// Requests rejected by the rate limiter
    pub rate_limited_requests: u64,

    /// Audit writes that failed or timed out
    pub audit_failures: u64,

    pub latency_p50_ms: f64,
    pub latency_p90_ms: f64,
    pub latency_p99_ms: f64,
    pub avg_latency_ms: f64,
}

impl PipelineMetrics {
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

/// Shared metrics collector
#[derive(Debug)]
pub struct MetricsCollector {
    metrics: Arc<RwLock<PipelineMetrics>>,

    /// Latency samples for percentiles (bounded)
    latency_samples: Arc<RwLock<Vec<f64>>>,

    max_samples: usize,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(RwLock::new(PipelineMetrics::default())),
            latency_samples: Arc::new(RwLock::new(Vec::with_capacity(10_000))),
            max_samples: 10_000,
        }
    }

    /// Record a completed pipeline request
    pub async fn record_request(&self, latency: Duration, success: bool) {
        {
            let mut metrics = self.metrics.write().await;
            metrics.total_requests += 1;
            if !success {
                metrics.failed_requests += 1;
            }
        }
        self.record_latency(latency).await;
    }

    pub async fn record_denial(&self) {
        self.metrics.write().await.denied_requests += 1;
    }

    pub async fn record_cache_hit(&self) {
        self.metrics.write().await.cache_hits += 1;
    }

    pub async fn record_cache_miss(&self) {
        self.metrics.write().await.cache_misses += 1;
    }

    pub async fn record_slow_request(&self) {
        self.metrics.write().await.slow_requests += 1;
    }

    pub async fn record_rate_limited(&self) {
        self.metrics.write().await.rate_limited_requests += 1;
    }

    pub async fn record_audit_failure(&self) {
        self.metrics.write().await.audit_failures += 1;
    }

    async fn record_latency(&self, latency: Duration) {
        let latency_ms = latency.as_secs_f64() * 1000.0;

        let mut samples = self.latency_samples.write().await;
        samples.push(latency_ms);

        // Keep only recent samples
        if samples.len() > self.max_samples {
            samples.drain(0..1_000);
        }

        let mut sorted = samples.clone();
        drop(samples);
        sorted.sort_by(f64::total_cmp);

        let mut metrics = self.metrics.write().await;
        metrics.avg_latency_ms = sorted.iter().sum::<f64>() / sorted.len() as f64;
        metrics.latency_p50_ms = Self::percentile(&sorted, 0.50);
        metrics.latency_p90_ms = Self::percentile(&sorted, 0.90);
        metrics.latency_p99_ms = Self::percentile(&sorted, 0.99);
    }

    pub async fn snapshot(&self) -> PipelineMetrics {
        self.metrics.read().await.clone()
    }

    pub async fn reset(&self) {
        *self.metrics.write().await = PipelineMetrics::default();
        self.latency_samples.write().await.clear();
    }

    /// Export metrics in Prometheus text format
    pub async fn export_prometheus(&self) -> String {
        let metrics = self.metrics.read().await;

        format!(
            r#"# HELP pipeline_requests_total Requests dispatched through the pipeline
# TYPE pipeline_requests_total counter
pipeline_requests_total {}

# HELP pipeline_failures_total Requests that failed in a behavior or handler
# TYPE pipeline_failures_total counter
pipeline_failures_total {}

# HELP authz_denied_total Authorization denials
# TYPE authz_denied_total counter
authz_denied_total {}

# HELP pipeline_cache_hits_total Query cache hits
# TYPE pipeline_cache_hits_total counter
pipeline_cache_hits_total {}

# HELP pipeline_cache_misses_total Query cache misses
# TYPE pipeline_cache_misses_total counter
pipeline_cache_misses_total {}

# HELP pipeline_slow_requests_total Requests over the slow threshold
# TYPE pipeline_slow_requests_total counter
pipeline_slow_requests_total {}

# HELP rate_limited_total Requests rejected by the rate limiter
# TYPE rate_limited_total counter
rate_limited_total {}

# HELP audit_failures_total Audit writes that failed or timed out
# TYPE audit_failures_total counter
audit_failures_total {}

# HELP pipeline_latency_seconds Request latency percentiles
# TYPE pipeline_latency_seconds summary
pipeline_latency_seconds{{quantile="0.5"}} {}
pipeline_latency_seconds{{quantile="0.9"}} {}
pipeline_latency_seconds{{quantile="0.99"}} {}
"#,
            metrics.total_requests,
            metrics.failed_requests,
            metrics.denied_requests,
            metrics.cache_hits,
            metrics.cache_misses,
            metrics.slow_requests,
            metrics.rate_limited_requests,
            metrics.audit_failures,
            metrics.latency_p50_ms / 1000.0,
            metrics.latency_p90_ms / 1000.0,
            metrics.latency_p99_ms / 1000.0,
        )
    }

    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }

        let idx = ((sorted.len() as f64) * p) as usize;
        sorted[idx.min(sorted.len() - 1)]
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
