//! Per-invocation pipeline context

use crate::types::Principal;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// State carried through one pipeline invocation
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub principal: Option<Principal>,
    pub correlation_id: Uuid,
    pub started_at: Instant,
    pub cancellation: CancellationToken,
}

impl PipelineContext {
    pub fn new(principal: Option<Principal>) -> Self {
        Self {
            principal,
            correlation_id: Uuid::new_v4(),
            started_at: Instant::now(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn anonymous() -> Self {
        Self::new(None)
    }

    /// Reuse an upstream id (e.g. the HTTP request id)
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.principal.as_ref().map(|p| p.user_id)
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
