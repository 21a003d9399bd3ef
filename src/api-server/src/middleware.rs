//! Middleware layer for the API server
//!
//! This module provides middleware components for:
//! - Request ID tracking and request logging
//! - CORS configuration
//! - Identity headers from the upstream authentication gateway
//! - Per-client rate limiting
//! - Named-policy route guards

use crate::{error::ApiError, state::AppState};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use communitycar_authz::{
    ratelimit::client_key, MetricsCollector, Permission, PolicyRegistry, Principal, RateLimitDecision, Role,
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Request ID header name
pub const X_REQUEST_ID: &str = "x-request-id";

/// Identity headers set by the authentication gateway
pub const X_USER_ID: &str = "x-user-id";
pub const X_USER_EMAIL: &str = "x-user-email";
pub const X_USER_ROLE: &str = "x-user-role";
pub const X_USER_PERMISSIONS: &str = "x-user-permissions";

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Configure CORS middleware
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            HeaderName::from_static(X_REQUEST_ID),
            HeaderName::from_static(X_USER_ID),
            HeaderName::from_static(X_USER_EMAIL),
            HeaderName::from_static(X_USER_ROLE),
            HeaderName::from_static(X_USER_PERMISSIONS),
        ])
        .expose_headers([
            HeaderName::from_static(X_REQUEST_ID),
            HeaderName::from_static(X_RATELIMIT_LIMIT),
            HeaderName::from_static(X_RATELIMIT_REMAINING),
            header::RETRY_AFTER,
        ])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Request ID middleware
///
/// Reuses a well-formed `x-request-id` from the caller or generates one. The
/// id is stored in request extensions and echoed on the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    request.extensions_mut().insert(request_id);

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }

    response
}

/// Request logging middleware
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request.extensions().get::<Uuid>().copied().unwrap_or_else(Uuid::new_v4);

    debug!(request_id = %request_id, method = %method, uri = %uri, "Incoming request");

    let start = std::time::Instant::now();
    let response = next.run(request).await;
    let duration_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    match status {
        500..=599 => error!(request_id = %request_id, method = %method, uri = %uri, status, duration_ms, "Request completed"),
        400..=499 => warn!(request_id = %request_id, method = %method, uri = %uri, status, duration_ms, "Request completed"),
        _ => info!(request_id = %request_id, method = %method, uri = %uri, status, duration_ms, "Request completed"),
    }

    response
}

/// Principal described by the gateway identity headers.
///
/// Returns `None` when no identity is present or when any part of it is
/// malformed; the request then proceeds anonymously.
pub fn principal_from_headers(headers: &HeaderMap) -> Option<Principal> {
    let raw_id = headers.get(X_USER_ID)?.to_str().ok()?;
    let user_id = match Uuid::parse_str(raw_id.trim()) {
        Ok(id) => id,
        Err(_) => {
            warn!(header = X_USER_ID, "Malformed user id, treating request as anonymous");
            return None;
        }
    };

    let raw_role = headers.get(X_USER_ROLE).and_then(|v| v.to_str().ok())?;
    let role = match raw_role.trim().parse::<Role>() {
        Ok(role) => role,
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "Unknown role, treating request as anonymous");
            return None;
        }
    };

    let mut principal = Principal::new(user_id, role);

    if let Some(email) = headers.get(X_USER_EMAIL).and_then(|v| v.to_str().ok()) {
        if !email.trim().is_empty() {
            principal = principal.with_email(email.trim());
        }
    }

    if let Some(claims) = headers.get(X_USER_PERMISSIONS).and_then(|v| v.to_str().ok()) {
        for claim in claims.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            principal = principal.with_permission(Permission::new(claim));
        }
    }

    Some(principal)
}

/// Attach the caller's [`Principal`] to request extensions
pub async fn authentication_middleware(mut request: Request, next: Next) -> Response {
    if let Some(principal) = principal_from_headers(request.headers()) {
        debug!(user_id = %principal.user_id, role = %principal.role, "Principal attached");
        request.extensions_mut().insert(principal);
    }

    next.run(request).await
}

/// Client address: the socket peer, or the first `x-forwarded-for` hop when
/// the deployment trusts its proxy to set that header
fn client_ip(request: &Request, trust_forwarded_for: bool) -> Option<IpAddr> {
    let forwarded = || {
        request
            .headers()
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|hop| hop.trim().parse().ok())
    };
    let peer = || {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    };

    if trust_forwarded_for {
        forwarded().or_else(peer)
    } else {
        peer()
    }
}

/// Fixed-window rate limiting keyed by user, or by address for anonymous callers
pub async fn rate_limit_middleware(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let user_id = request.extensions().get::<Principal>().map(|p| p.user_id);
    let key = client_key(user_id, client_ip(&request, state.trust_forwarded_for));

    match state.rate_limiter.check(&key) {
        RateLimitDecision::Allowed { limit, remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
            headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
            response
        }
        decision @ RateLimitDecision::Limited { .. } => {
            let retry_after_secs = decision.retry_after_secs().unwrap_or(1);
            debug!(client = %key, retry_after_secs, "Rejecting rate limited request");
            state.metrics.record_rate_limited().await;
            ApiError::RateLimited { retry_after_secs }.into_response()
        }
    }
}

/// Route guard evaluating one named policy against the request principal
#[derive(Clone)]
pub struct PolicyGuard {
    policies: Arc<PolicyRegistry>,
    metrics: Arc<MetricsCollector>,
    policy: &'static str,
}

impl PolicyGuard {
    pub fn new(policies: Arc<PolicyRegistry>, metrics: Arc<MetricsCollector>, policy: &'static str) -> Self {
        Self {
            policies,
            metrics,
            policy,
        }
    }

    pub fn policy(&self) -> &'static str {
        self.policy
    }
}

/// Reject the request unless the guard's policy succeeds
pub async fn require_policy(
    State(guard): State<PolicyGuard>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let outcome = guard
        .policies
        .authorize(guard.policy, request.extensions().get::<Principal>());

    if let Err(e) = outcome {
        guard.metrics.record_denial().await;
        return Err(e.into());
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
        Extension, Router,
    };
    use communitycar_authz::{policy::names, RateLimitConfig};
    use std::time::Duration;
    use tower::ServiceExt;

    async fn test_handler() -> &'static str {
        "OK"
    }

    async fn whoami(principal: Option<Extension<Principal>>) -> String {
        principal.map(|Extension(p)| p.role.to_string()).unwrap_or_else(|| "anonymous".to_string())
    }

    fn identity(role: &str) -> Request<Body> {
        Request::builder()
            .uri("/")
            .header(X_USER_ID, Uuid::new_v4().to_string())
            .header(X_USER_ROLE, role)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_request_id_middleware() {
        let app = Router::new()
            .route("/", get(test_handler))
            .layer(middleware::from_fn(request_id_middleware));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.headers().contains_key(X_REQUEST_ID));
    }

    #[test]
    fn test_principal_from_headers() {
        let mut headers = HeaderMap::new();
        let user_id = Uuid::new_v4();
        headers.insert(X_USER_ID, HeaderValue::from_str(&user_id.to_string()).unwrap());
        headers.insert(X_USER_ROLE, HeaderValue::from_static("CMSAdmin"));
        headers.insert(X_USER_EMAIL, HeaderValue::from_static("cms@communitycar.test"));
        headers.insert(
            X_USER_PERMISSIONS,
            HeaderValue::from_static("admin.analytics.view, admin.reports.generate,"),
        );

        let principal = principal_from_headers(&headers).unwrap();
        assert_eq!(principal.user_id, user_id);
        assert_eq!(principal.role, Role::CmsAdmin);
        assert_eq!(principal.email.as_deref(), Some("cms@communitycar.test"));
        assert_eq!(principal.permissions.len(), 2);
    }

    #[test]
    fn test_malformed_identity_is_anonymous() {
        let mut headers = HeaderMap::new();
        headers.insert(X_USER_ID, HeaderValue::from_static("not-a-uuid"));
        headers.insert(X_USER_ROLE, HeaderValue::from_static("Admin"));
        assert!(principal_from_headers(&headers).is_none());

        headers.insert(X_USER_ID, HeaderValue::from_str(&Uuid::new_v4().to_string()).unwrap());
        headers.insert(X_USER_ROLE, HeaderValue::from_static("Janitor"));
        assert!(principal_from_headers(&headers).is_none());
    }

    #[tokio::test]
    async fn test_authentication_middleware_attaches_principal() {
        let app = Router::new()
            .route("/", get(whoami))
            .layer(middleware::from_fn(authentication_middleware));

        let response = app.clone().oneshot(identity("Moderator")).await.unwrap();
        assert_eq!(body_string(response).await, "Moderator");

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_string(response).await, "anonymous");
    }

    #[tokio::test]
    async fn test_rate_limit_middleware() {
        let config = AppConfig::default()
            .with_rate_limit(RateLimitConfig {
                limit: 2,
                window: Duration::from_secs(60),
            })
            .with_trust_forwarded_for(true);
        let state = Arc::new(AppState::new(&config).unwrap());
        let app = Router::new()
            .route("/", get(test_handler))
            .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware));

        let request = || {
            Request::builder()
                .uri("/")
                .header(X_FORWARDED_FOR, "203.0.113.7, 10.0.0.1")
                .body(Body::empty())
                .unwrap()
        };

        let first = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()[X_RATELIMIT_LIMIT], "2");
        assert_eq!(first.headers()[X_RATELIMIT_REMAINING], "1");

        app.clone().oneshot(request()).await.unwrap();
        let limited = app.oneshot(request()).await.unwrap();
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(limited.headers().contains_key(header::RETRY_AFTER));

        assert!(state.rate_limiter.window("ip:203.0.113.7").is_some());
        assert_eq!(state.metrics.snapshot().await.rate_limited_requests, 1);
    }

    #[tokio::test]
    async fn test_forwarded_for_ignored_unless_trusted() {
        let config = AppConfig::default().with_rate_limit(RateLimitConfig {
            limit: 2,
            window: Duration::from_secs(60),
        });
        let state = Arc::new(AppState::new(&config).unwrap());
        let app = Router::new()
            .route("/", get(test_handler))
            .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware));

        let request = |i: usize| {
            let mut request = Request::builder()
                .uri("/")
                .header(X_FORWARDED_FOR, format!("198.51.100.{}", i))
                .body(Body::empty())
                .unwrap();
            request
                .extensions_mut()
                .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 10], 50000))));
            request
        };

        let mut accepted = 0;
        for i in 0..10 {
            if app.clone().oneshot(request(i)).await.unwrap().status() == StatusCode::OK {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 2);
        assert!(state.rate_limiter.window("ip:192.0.2.10").is_some());
        assert_eq!(state.rate_limiter.tracked_clients(), 1);
    }

    #[tokio::test]
    async fn test_require_policy() {
        let state = AppState::new(&AppConfig::default()).unwrap();
        let app = Router::new()
            .route("/", get(test_handler))
            .route_layer(middleware::from_fn_with_state(
                state.guard(names::USER_MANAGEMENT),
                require_policy,
            ))
            .layer(middleware::from_fn(authentication_middleware));

        let allowed = app.clone().oneshot(identity("UserAdmin")).await.unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);

        let denied = app.clone().oneshot(identity("ContentAdmin")).await.unwrap();
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);

        let anonymous = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    }
}
