use crate::rbac::RbacError;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use communitycar_authz::AuthzError;
use serde_json::json;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ValidationError(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            // Client closed request
            ApiError::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Unauthenticated => ApiError::Unauthenticated,
            AuthzError::Forbidden(msg) => ApiError::Forbidden(msg),
            AuthzError::RateLimited { retry_after_secs } => ApiError::RateLimited { retry_after_secs },
            AuthzError::Cancelled => ApiError::Cancelled,
            AuthzError::InvalidInput(msg) => ApiError::BadRequest(msg),
            AuthzError::UnknownRole(role) => ApiError::BadRequest(format!("unknown role: {}", role)),
            AuthzError::Handler(inner) => match inner.downcast::<RbacError>() {
                Ok(rbac) => rbac.into(),
                Err(inner) => match inner.downcast::<AuthzError>() {
                    Ok(authz) => authz.into(),
                    Err(other) => ApiError::InternalError(other.to_string()),
                },
            },
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

impl From<RbacError> for ApiError {
    fn from(err: RbacError) -> Self {
        match err {
            RbacError::Unauthenticated => ApiError::Unauthenticated,
            RbacError::Forbidden(msg) => ApiError::Forbidden(msg),
            RbacError::NotFound(msg) => ApiError::NotFound(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let retry_after = match &self {
            ApiError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };
        let message = match self {
            ApiError::Unauthenticated => "Authentication required".to_string(),
            ApiError::RateLimited { .. } => "Too many requests".to_string(),
            ApiError::Cancelled => "Request cancelled".to_string(),
            ApiError::Forbidden(msg)
            | ApiError::ValidationError(msg)
            | ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::InternalError(msg) => msg,
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authz_error_mapping() {
        assert!(matches!(ApiError::from(AuthzError::Unauthenticated), ApiError::Unauthenticated));
        assert!(matches!(
            ApiError::from(AuthzError::Forbidden("no".into())),
            ApiError::Forbidden(_)
        ));
        assert!(matches!(
            ApiError::from(AuthzError::UnknownRole("Janitor".into())),
            ApiError::BadRequest(_)
        ));
    }

    #[test]
    fn test_handler_errors_are_unwrapped() {
        let err = AuthzError::Handler(RbacError::Forbidden("cannot assign Admin".into()).into());
        assert!(matches!(ApiError::from(err), ApiError::Forbidden(_)));

        let err = AuthzError::Handler(anyhow::anyhow!("disk on fire"));
        assert_eq!(ApiError::from(err).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = ApiError::RateLimited { retry_after_secs: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }

    #[test]
    fn test_cancelled_is_499() {
        assert_eq!(ApiError::Cancelled.status_code().as_u16(), 499);
    }
}
