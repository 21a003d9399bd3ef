//! Request traits for commands and queries

use super::context::PipelineContext;
use crate::policy::AuthorizationRequirement;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default TTL for cacheable queries
pub const DEFAULT_CACHE_DURATION: Duration = Duration::from_secs(300);

/// Command mutates state and is audited; query reads and may be cached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
    Command,
    Query,
}

impl RequestKind {
    /// Classify by naming convention: names ending in `Command` are commands
    pub fn from_name(name: &str) -> Self {
        if name.ends_with("Command") {
            RequestKind::Command
        } else {
            RequestKind::Query
        }
    }
}

/// Object-safe request metadata consumed by behaviors
pub trait RequestMeta: Send + Sync {
    /// Stable request type name, e.g. `AssignRoleCommand`
    fn name(&self) -> &'static str;

    fn kind(&self) -> RequestKind {
        RequestKind::from_name(self.name())
    }

    /// Entity type recorded in audit entries
    fn entity_type(&self) -> &'static str {
        let name = self.name();
        name.strip_suffix("Command")
            .or_else(|| name.strip_suffix("Query"))
            .unwrap_or(name)
    }

    /// Role/permission requirement re-checked by the authorization behavior
    fn authorization(&self) -> Option<AuthorizationRequirement> {
        None
    }

    /// Queries that opt into caching return themselves here
    fn as_cacheable(&self) -> Option<&dyn CacheableQuery> {
        None
    }
}

/// Typed request dispatched through the pipeline
pub trait Request: RequestMeta {
    type Response: Serialize + DeserializeOwned + Send + Sync + 'static;
}

/// Query that opts into cache-aside lookup
pub trait CacheableQuery: Send + Sync {
    /// Deterministic key for the query parameters
    fn cache_key(&self) -> String;

    fn cache_duration(&self) -> Duration {
        DEFAULT_CACHE_DURATION
    }

    fn bypass_cache(&self) -> bool {
        false
    }
}

/// Terminal handler for one request type
#[async_trait]
pub trait RequestHandler<R: Request>: Send + Sync {
    async fn handle(&self, request: &R, ctx: &PipelineContext) -> anyhow::Result<R::Response>;
}
