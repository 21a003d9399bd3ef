//! HTTP surface for CommunityCar admin authorization
//!
//! Identity headers from the authentication gateway become a
//! [`communitycar_authz::Principal`], every request is rate limited per
//! client, routes are guarded by named policies, and RBAC commands and
//! queries run through the authorization pipeline.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod rbac;
pub mod routes;
pub mod server;
pub mod state;

pub use config::AppConfig;
pub use error::{ApiError, Result};
pub use routes::create_router;
pub use server::{Server, ServerBuilder, ServerConfig};
pub use state::AppState;

/// API version
pub const API_VERSION: &str = "v1";
