//! Logging behavior

use super::{Next, PipelineBehavior};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Instant;
use tracing::{error, info};

/// Start, completion and failure markers for every request
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingBehavior;

#[async_trait]
impl PipelineBehavior for LoggingBehavior {
    fn name(&self) -> &'static str {
        "logging"
    }

    async fn handle(&self, next: Next<'_>) -> Result<Value> {
        let request = next.request().name();
        let correlation_id = next.ctx().correlation_id;
        let start = Instant::now();

        info!(request, correlation_id = %correlation_id, "Handling request");

        let result = next.run().await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => info!(request, correlation_id = %correlation_id, elapsed_ms, "Request completed"),
            Err(e) => error!(
                request,
                correlation_id = %correlation_id,
                elapsed_ms,
                error = %e,
                "Request failed"
            ),
        }

        result
    }
}
