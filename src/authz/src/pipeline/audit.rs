//! Audit behavior for commands

use super::{Next, PipelineBehavior, RequestKind};
use crate::audit::{AuditEntry, AuditMode, AuditWriter};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Writes one audit entry per executed command. Queries pass through.
pub struct AuditBehavior {
    writer: Arc<AuditWriter>,
}

impl AuditBehavior {
    pub fn new(writer: Arc<AuditWriter>) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl PipelineBehavior for AuditBehavior {
    fn name(&self) -> &'static str {
        "audit"
    }

    async fn handle(&self, next: Next<'_>) -> Result<Value> {
        let request = next.request();
        if request.kind() != RequestKind::Command {
            return next.run().await;
        }

        let ctx = next.ctx();
        let entry = |is_success: bool| {
            AuditEntry::new(request.name(), request.entity_type(), is_success)
                .with_user(
                    ctx.user_id(),
                    ctx.principal().and_then(|p| p.email.clone()),
                )
                .with_correlation_id(ctx.correlation_id)
        };

        match self.writer.mode() {
            AuditMode::Attempt => {
                self.writer.write(entry(true)).await;
                next.run().await
            }
            AuditMode::Outcome => {
                let result = next.run().await;
                self.writer.write(entry(result.is_ok())).await;
                result
            }
        }
    }
}
