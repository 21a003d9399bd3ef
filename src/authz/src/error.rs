//! Error types for the authorization core

use thiserror::Error;

/// Authorization core errors
#[derive(Debug, Error)]
pub enum AuthzError {
    /// No principal is attached to the request
    #[error("Unauthenticated: request carries no principal")]
    Unauthenticated,

    /// Principal is authenticated but lacks the required role or permission
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Client exceeded its request budget for the current window
    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Error raised by the terminal request handler, passed through unchanged
    #[error(transparent)]
    Handler(anyhow::Error),

    /// Caller cancelled the request while it was in the pipeline
    #[error("Request cancelled")]
    Cancelled,

    /// A policy with the same name is already registered
    #[error("Policy already registered: {0}")]
    DuplicatePolicy(String),

    /// Role name does not match any known role
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    /// Role table violates a structural invariant
    #[error("Invalid role registry: {0}")]
    InvalidRegistry(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Cache error
    #[error("Cache error: {0}")]
    CacheError(String),

    /// Audit sink error
    #[error("Audit error: {0}")]
    AuditError(String),

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Response (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthzError {
    /// HTTP status code this error surfaces as
    pub fn status_code(&self) -> u16 {
        match self {
            AuthzError::Unauthenticated => 401,
            AuthzError::Forbidden(_) => 403,
            AuthzError::RateLimited { .. } => 429,
            AuthzError::InvalidInput(_) | AuthzError::UnknownRole(_) => 400,
            AuthzError::Cancelled => 499,
            _ => 500,
        }
    }

    /// True for the fail-closed authorization outcomes (401/403)
    pub fn is_authorization_failure(&self) -> bool {
        matches!(self, AuthzError::Unauthenticated | AuthzError::Forbidden(_))
    }
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;
