//! # CommunityCar Admin Authorization
//!
//! Role/permission access control and the cross-cutting request pipeline for
//! the CommunityCar admin API.
//!
//! ## Components
//!
//! - **Permission registry**: permission identifiers, per-role permission sets
//!   and the role-management hierarchy
//! - **Policy registry**: named policies evaluated as role predicates or
//!   permission requirements
//! - **Pipeline**: authorization, logging, performance, caching and audit
//!   behaviors wrapped around every command and query handler
//! - **Rate limiter**: per-client fixed-window admission control
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use communitycar_authz::{
//!     policy::names, PermissionAuthorizationHandler, PermissionRegistry, PolicyRegistry,
//!     Principal, Role,
//! };
//!
//! let registry = Arc::new(PermissionRegistry::standard());
//! let policies = PolicyRegistry::with_defaults(PermissionAuthorizationHandler::new(registry)).unwrap();
//!
//! let principal = Principal::new(uuid::Uuid::new_v4(), Role::ContentAdmin);
//! assert!(policies.authorize(names::CONTENT_MANAGE, Some(&principal)).is_ok());
//! assert!(policies.authorize(names::USER_MANAGEMENT, Some(&principal)).is_err());
//! ```

pub mod audit;
pub mod cache;
pub mod clock;
pub mod error;
pub mod metrics;
pub mod permissions;
pub mod pipeline;
pub mod policy;
pub mod ratelimit;
pub mod types;

// Re-export commonly used types
pub use audit::{AuditConfig, AuditEntry, AuditMode, AuditSink, AuditStats, AuditWriter, InMemoryAuditSink};
pub use cache::{CacheConfig, CacheStore, InMemoryCacheStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AuthzError, Result};
pub use metrics::MetricsCollector;
pub use permissions::{catalog, ContentSpecialization, PermissionRegistry, RoleDefinition};
pub use pipeline::{
    CacheableQuery, Pipeline, PipelineConfig, PipelineContext, Request, RequestHandler, RequestKind,
    RequestMeta,
};
pub use policy::{
    AuthorizationOutcome, AuthorizationRequirement, DenialReason, PermissionAuthorizationHandler,
    PermissionRequirement, Policy, PolicyRegistry,
};
pub use ratelimit::{RateLimitConfig, RateLimitDecision, RateLimiter};
pub use types::{Permission, Principal, Role};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
