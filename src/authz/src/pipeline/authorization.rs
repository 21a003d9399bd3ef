//! Authorization behavior

use super::{Next, PipelineBehavior};
use crate::error::Result;
use crate::metrics::MetricsCollector;
use crate::policy::PermissionAuthorizationHandler;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Re-validates the request's declared role/permission requirement.
///
/// Runs first so a denied request never reaches logging, caching or audit.
pub struct AuthorizationBehavior {
    handler: PermissionAuthorizationHandler,
    metrics: Option<Arc<MetricsCollector>>,
}

impl AuthorizationBehavior {
    pub fn new(handler: PermissionAuthorizationHandler) -> Self {
        Self { handler, metrics: None }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

#[async_trait]
impl PipelineBehavior for AuthorizationBehavior {
    fn name(&self) -> &'static str {
        "authorization"
    }

    async fn handle(&self, next: Next<'_>) -> Result<Value> {
        let request = next.request();
        if let Some(requirement) = request.authorization() {
            let ctx = next.ctx();
            let outcome = self.handler.evaluate_requirement(ctx.principal(), &requirement);
            if let Err(e) = outcome.into_result() {
                warn!(
                    request = request.name(),
                    correlation_id = %ctx.correlation_id,
                    user_id = ?ctx.user_id(),
                    error = %e,
                    "Request denied"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_denial().await;
                }
                return Err(e);
            }
        }

        next.run().await
    }
}
