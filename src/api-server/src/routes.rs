//! Route definitions for the API server
//!
//! Routes are organized by functionality:
//! - Health and metrics endpoints
//! - Admin RBAC endpoints under `/api/v1/rbac`, each guarded by a named policy

use crate::{handlers, middleware, state::AppState};
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use communitycar_authz::policy::names;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI documentation configuration
#[derive(OpenApi)]
#[openapi(
    info(
        title = "CommunityCar Admin RBAC API",
        version = "1.0.0",
        description = "Role and permission administration for the CommunityCar admin surface"
    ),
    paths(
        handlers::health_check,
        handlers::metrics,
        handlers::list_roles,
        handlers::role_permissions,
        handlers::manageable_roles,
        handlers::check_permission,
        handlers::assign_role,
        handlers::activity_log,
    ),
    components(
        schemas(
            crate::models::HealthResponse,
            crate::models::RoleResponse,
            crate::models::RolePermissionsResponse,
            crate::models::CheckPermissionRequest,
            crate::models::CheckPermissionResponse,
            crate::models::AssignRoleRequest,
            crate::models::AssignRoleResponse,
            crate::models::ActivityLogResponse,
            crate::models::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health and monitoring endpoints"),
        (name = "rbac", description = "Role and permission administration"),
    )
)]
pub struct ApiDoc;

fn guarded(state: &AppState, policy: &'static str, router: Router<Arc<AppState>>) -> Router<Arc<AppState>> {
    router.route_layer(axum_middleware::from_fn_with_state(
        state.guard(policy),
        middleware::require_policy,
    ))
}

fn rbac_routes(state: &AppState) -> Router<Arc<AppState>> {
    let roles_view = guarded(
        state,
        names::ROLES_VIEW,
        Router::new()
            .route("/roles", get(handlers::list_roles))
            .route("/roles/:role/permissions", get(handlers::role_permissions)),
    );

    let user_management = guarded(
        state,
        names::USER_MANAGEMENT,
        Router::new().route("/assign-role", post(handlers::assign_role)),
    );

    let logs_view = guarded(
        state,
        names::LOGS_VIEW,
        Router::new().route("/activity-log", get(handlers::activity_log)),
    );

    Router::new()
        .route("/roles/manageable", get(handlers::manageable_roles))
        .route("/check-permission", post(handlers::check_permission))
        .merge(roles_view)
        .merge(user_management)
        .merge(logs_view)
}

/// Create the application router with all routes and middleware
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .nest("/api/v1/rbac", rbac_routes(&state))
        .merge(SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state.clone())
        // Executed bottom to top; identity must be known before rate limiting
        .layer(axum_middleware::from_fn_with_state(state, middleware::rate_limit_middleware))
        .layer(axum_middleware::from_fn(middleware::authentication_middleware))
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(middleware::cors_layer())
        .layer(TraceLayer::new_for_http())
}
