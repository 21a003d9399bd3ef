use crate::{config::AppConfig, middleware::PolicyGuard, rbac::RbacService};
use communitycar_authz::{
    AuditSink, AuditWriter, CacheStore, Clock, InMemoryAuditSink, InMemoryCacheStore, MetricsCollector,
    PermissionAuthorizationHandler, PermissionRegistry, Pipeline, PolicyRegistry, RateLimiter, SystemClock,
};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Role table and management hierarchy
    pub permissions: Arc<PermissionRegistry>,

    /// Named policies guarding routes
    pub policies: Arc<PolicyRegistry>,

    /// Behavior chain every RBAC request is dispatched through
    pub pipeline: Arc<Pipeline>,

    pub rate_limiter: Arc<RateLimiter>,

    /// Whether anonymous callers are keyed by `x-forwarded-for`
    pub trust_forwarded_for: bool,

    pub audit: Arc<AuditWriter>,

    pub cache: Arc<dyn CacheStore>,

    pub metrics: Arc<MetricsCollector>,

    /// Terminal handler for RBAC commands and queries
    pub rbac: Arc<RbacService>,

    /// Server start time for uptime calculation
    pub start_time: Instant,

    /// Application version
    pub version: String,
}

impl AppState {
    pub fn new(config: &AppConfig) -> communitycar_authz::Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build state with an injected clock for the rate limiter and cache
    pub fn with_clock(config: &AppConfig, clock: Arc<dyn Clock>) -> communitycar_authz::Result<Self> {
        let permissions = Arc::new(PermissionRegistry::standard());
        permissions.validate()?;

        let policies = Arc::new(PolicyRegistry::with_defaults(PermissionAuthorizationHandler::new(
            permissions.clone(),
        ))?);

        let metrics = Arc::new(MetricsCollector::new());
        let cache: Arc<dyn CacheStore> = Arc::new(InMemoryCacheStore::with_clock(config.cache.clone(), clock.clone()));
        let audit_sink: Arc<dyn AuditSink> = Arc::new(InMemoryAuditSink::new(config.audit.buffer_capacity));
        let audit = Arc::new(AuditWriter::new(audit_sink.clone(), config.audit.clone()).with_metrics(metrics.clone()));

        let pipeline = Arc::new(Pipeline::standard(
            &config.pipeline,
            PermissionAuthorizationHandler::new(permissions.clone()),
            cache.clone(),
            audit.clone(),
            metrics.clone(),
        ));

        Ok(Self {
            rbac: Arc::new(RbacService::new(permissions.clone(), audit_sink)),
            permissions,
            policies,
            pipeline,
            rate_limiter: Arc::new(RateLimiter::with_clock(config.rate_limit, clock)),
            trust_forwarded_for: config.trust_forwarded_for,
            audit,
            cache,
            metrics,
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// Route guard for the named policy
    pub fn guard(&self, policy: &'static str) -> PolicyGuard {
        PolicyGuard::new(self.policies.clone(), self.metrics.clone(), policy)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_builds_standard_pipeline() {
        let state = AppState::new(&AppConfig::default()).unwrap();
        assert_eq!(
            state.pipeline.behavior_names(),
            vec!["authorization", "logging", "performance", "caching", "audit"]
        );
        assert!(!state.policies.is_empty());
    }
}
