//! Request pipeline
//!
//! Every command and query is dispatched through an ordered chain of
//! behaviors wrapped around a terminal handler:
//!
//! ```text
//! Authorization -> Logging -> Performance -> Caching -> Audit -> Handler
//! ```
//!
//! The chain is assembled once at startup. Responses travel through the chain
//! as `serde_json::Value` and are decoded to the request's response type at
//! the edge, which lets the caching behavior store any response.

pub mod audit;
pub mod authorization;
pub mod caching;
pub mod context;
pub mod logging;
pub mod performance;
pub mod request;

pub use audit::AuditBehavior;
pub use authorization::AuthorizationBehavior;
pub use caching::CachingBehavior;
pub use context::PipelineContext;
pub use logging::LoggingBehavior;
pub use performance::PerformanceBehavior;
pub use request::{CacheableQuery, Request, RequestHandler, RequestKind, RequestMeta};

use crate::audit::AuditWriter;
use crate::cache::CacheStore;
use crate::error::{AuthzError, Result};
use crate::metrics::MetricsCollector;
use crate::policy::PermissionAuthorizationHandler;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Requests slower than this are reported
    pub slow_request_threshold: Duration,

    pub enable_caching: bool,

    pub enable_audit: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            slow_request_threshold: Duration::from_millis(500),
            enable_caching: true,
            enable_audit: true,
        }
    }
}

type Terminal<'a> = Box<dyn FnOnce() -> BoxFuture<'a, Result<Value>> + Send + 'a>;

/// Remainder of the chain after the current behavior
pub struct Next<'a> {
    request: &'a dyn RequestMeta,
    ctx: &'a PipelineContext,
    behaviors: &'a [Arc<dyn PipelineBehavior>],
    terminal: Terminal<'a>,
}

impl<'a> Next<'a> {
    pub fn request(&self) -> &'a dyn RequestMeta {
        self.request
    }

    pub fn ctx(&self) -> &'a PipelineContext {
        self.ctx
    }

    /// Invoke the next behavior, or the handler when none remain
    pub async fn run(self) -> Result<Value> {
        match self.behaviors.split_first() {
            Some((behavior, rest)) => {
                let next = Next {
                    request: self.request,
                    ctx: self.ctx,
                    behaviors: rest,
                    terminal: self.terminal,
                };
                behavior.handle(next).await
            }
            None => (self.terminal)().await,
        }
    }
}

/// Interceptor wrapped around request execution.
///
/// A behavior either short-circuits by returning without calling
/// [`Next::run`], or calls it exactly once. Errors from downstream must be
/// returned unchanged.
#[async_trait]
pub trait PipelineBehavior: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, next: Next<'_>) -> Result<Value>;
}

/// Ordered behavior chain
#[derive(Clone, Default)]
pub struct Pipeline {
    behaviors: Vec<Arc<dyn PipelineBehavior>>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Standard chain: authorization, logging, performance, caching, audit
    pub fn standard(
        config: &PipelineConfig,
        authorizer: PermissionAuthorizationHandler,
        cache: Arc<dyn CacheStore>,
        audit: Arc<AuditWriter>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let mut builder = Pipeline::builder()
            .behavior(AuthorizationBehavior::new(authorizer).with_metrics(metrics.clone()))
            .behavior(LoggingBehavior)
            .behavior(PerformanceBehavior::new(config.slow_request_threshold).with_metrics(metrics.clone()));

        if config.enable_caching {
            builder = builder.behavior(CachingBehavior::new(cache).with_metrics(metrics));
        }
        if config.enable_audit {
            builder = builder.behavior(AuditBehavior::new(audit));
        }

        builder.build()
    }

    pub fn behavior_names(&self) -> Vec<&'static str> {
        self.behaviors.iter().map(|b| b.name()).collect()
    }

    /// Dispatch `request` through the chain to `handler`.
    ///
    /// Fails with [`AuthzError::Cancelled`] as soon as the context's token is
    /// cancelled. Side effects already performed (e.g. audit entries) remain.
    pub async fn send<R, H>(&self, request: &R, ctx: &PipelineContext, handler: &H) -> Result<R::Response>
    where
        R: Request,
        H: RequestHandler<R> + ?Sized,
    {
        if ctx.is_cancelled() {
            return Err(AuthzError::Cancelled);
        }

        let terminal: Terminal<'_> = Box::new(move || {
            async move {
                let response = handler.handle(request, ctx).await.map_err(AuthzError::Handler)?;
                Ok(serde_json::to_value(response)?)
            }
            .boxed()
        });

        let next = Next {
            request,
            ctx,
            behaviors: &self.behaviors,
            terminal,
        };

        let value = tokio::select! {
            biased;
            _ = ctx.cancellation.cancelled() => return Err(AuthzError::Cancelled),
            result = next.run() => result?,
        };

        Ok(serde_json::from_value(value)?)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("behaviors", &self.behavior_names())
            .finish()
    }
}

/// Builder for [`Pipeline`]; behaviors run in insertion order
#[derive(Default)]
pub struct PipelineBuilder {
    behaviors: Vec<Arc<dyn PipelineBehavior>>,
}

impl PipelineBuilder {
    pub fn behavior(mut self, behavior: impl PipelineBehavior + 'static) -> Self {
        self.behaviors.push(Arc::new(behavior));
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            behaviors: self.behaviors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl PipelineBehavior for Recorder {
        fn name(&self) -> &'static str {
            self.label
        }

        async fn handle(&self, next: Next<'_>) -> Result<Value> {
            self.log.lock().push(self.label);
            next.run().await
        }
    }

    struct PingQuery;

    impl RequestMeta for PingQuery {
        fn name(&self) -> &'static str {
            "PingQuery"
        }
    }

    impl Request for PingQuery {
        type Response = String;
    }

    struct PingHandler;

    #[async_trait]
    impl RequestHandler<PingQuery> for PingHandler {
        async fn handle(&self, _request: &PingQuery, _ctx: &PipelineContext) -> anyhow::Result<String> {
            Ok("pong".to_string())
        }
    }

    #[tokio::test]
    async fn test_behaviors_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .behavior(Recorder { label: "first", log: log.clone() })
            .behavior(Recorder { label: "second", log: log.clone() })
            .build();

        let response = pipeline
            .send(&PingQuery, &PipelineContext::anonymous(), &PingHandler)
            .await
            .unwrap();

        assert_eq!(response, "pong");
        assert_eq!(*log.lock(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_cancelled_context_fails_fast() {
        let pipeline = Pipeline::builder().build();
        let ctx = PipelineContext::anonymous();
        ctx.cancellation.cancel();

        let err = pipeline.send(&PingQuery, &ctx, &PingHandler).await.unwrap_err();
        assert!(matches!(err, AuthzError::Cancelled));
    }
}
