use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use communitycar_authz::{catalog, PipelineContext, Principal, Role};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::{
    error::{ApiError, Result},
    extract::{CurrentPrincipal, RequestId},
    models::*,
    rbac::{
        ActivityLogQuery, AssignRoleCommand, CheckPermissionQuery, ListRolesQuery, ManageableRolesQuery,
        RolePermissionsQuery,
    },
    state::AppState,
};

/// Default page size for the activity log
pub const DEFAULT_ACTIVITY_LOG_LIMIT: usize = 50;

fn context(principal: Principal, request_id: RequestId) -> PipelineContext {
    PipelineContext::new(Some(principal)).with_correlation_id(request_id.0)
}

fn parse_role(raw: &str) -> Result<Role> {
    raw.parse::<Role>().map_err(ApiError::from)
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// Prometheus metrics endpoint
#[utoipa::path(
    get,
    path = "/metrics",
    responses(
        (status = 200, description = "Prometheus text exposition", body = String)
    ),
    tag = "health"
)]
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.export_prometheus().await,
    )
}

/// List all admin roles
#[utoipa::path(
    get,
    path = "/api/v1/rbac/roles",
    params(RefreshParams),
    responses(
        (status = 200, description = "Role definitions, most privileged first", body = Vec<RoleResponse>),
        (status = 401, description = "Authentication required", body = ErrorResponse),
        (status = 403, description = "RolesView policy not satisfied", body = ErrorResponse)
    ),
    tag = "rbac"
)]
pub async fn list_roles(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    request_id: RequestId,
    Query(params): Query<RefreshParams>,
) -> Result<Json<Vec<RoleResponse>>> {
    let query = ListRolesQuery {
        bypass_cache: params.refresh,
    };
    let roles = state
        .pipeline
        .send(&query, &context(principal, request_id), state.rbac.as_ref())
        .await?;

    Ok(Json(roles))
}

/// Permissions granted by one role
#[utoipa::path(
    get,
    path = "/api/v1/rbac/roles/{role}/permissions",
    params(("role" = String, Path, description = "Role wire name, e.g. ContentAdmin")),
    responses(
        (status = 200, description = "Role permissions", body = RolePermissionsResponse),
        (status = 400, description = "Unknown role", body = ErrorResponse),
        (status = 403, description = "RolesView policy not satisfied", body = ErrorResponse)
    ),
    tag = "rbac"
)]
pub async fn role_permissions(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    request_id: RequestId,
    Path(role): Path<String>,
) -> Result<Json<RolePermissionsResponse>> {
    let query = RolePermissionsQuery { role: parse_role(&role)? };
    let response = state
        .pipeline
        .send(&query, &context(principal, request_id), state.rbac.as_ref())
        .await?;

    Ok(Json(response))
}

/// Roles the caller may assign or revoke
#[utoipa::path(
    get,
    path = "/api/v1/rbac/roles/manageable",
    responses(
        (status = 200, description = "Manageable roles", body = Vec<RoleResponse>),
        (status = 401, description = "Authentication required", body = ErrorResponse)
    ),
    tag = "rbac"
)]
pub async fn manageable_roles(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    request_id: RequestId,
) -> Result<Json<Vec<RoleResponse>>> {
    let query = ManageableRolesQuery { manager: principal.role };
    let roles = state
        .pipeline
        .send(&query, &context(principal, request_id), state.rbac.as_ref())
        .await?;

    Ok(Json(roles))
}

/// Check a permission for the calling principal
#[utoipa::path(
    post,
    path = "/api/v1/rbac/check-permission",
    request_body = CheckPermissionRequest,
    responses(
        (status = 200, description = "Permission decision", body = CheckPermissionResponse),
        (status = 400, description = "Invalid request or unknown permission", body = ErrorResponse),
        (status = 401, description = "Authentication required", body = ErrorResponse)
    ),
    tag = "rbac"
)]
pub async fn check_permission(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    request_id: RequestId,
    Json(req): Json<CheckPermissionRequest>,
) -> Result<Json<CheckPermissionResponse>> {
    req.validate().map_err(|e| ApiError::ValidationError(e.to_string()))?;

    let permission = catalog::find(req.permission.trim())
        .cloned()
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown permission: {}", req.permission.trim())))?;

    let query = CheckPermissionQuery { permission };
    let response = state
        .pipeline
        .send(&query, &context(principal, request_id), state.rbac.as_ref())
        .await?;

    Ok(Json(response))
}

/// Assign an admin role to a user
#[utoipa::path(
    post,
    path = "/api/v1/rbac/assign-role",
    request_body = AssignRoleRequest,
    responses(
        (status = 200, description = "Role assigned", body = AssignRoleResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Authentication required", body = ErrorResponse),
        (status = 403, description = "Caller cannot manage the current or target role", body = ErrorResponse)
    ),
    tag = "rbac"
)]
pub async fn assign_role(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    request_id: RequestId,
    Json(req): Json<AssignRoleRequest>,
) -> Result<Json<AssignRoleResponse>> {
    req.validate().map_err(|e| ApiError::ValidationError(e.to_string()))?;

    let command = AssignRoleCommand {
        user_id: req.user_id,
        role: parse_role(&req.role)?,
        current_role: req.current_role.as_deref().map(parse_role).transpose()?,
    };

    let response = state
        .pipeline
        .send(&command, &context(principal, request_id), state.rbac.as_ref())
        .await?;

    info!(
        request_id = %request_id.0,
        user_id = %response.user_id,
        role = %response.role,
        "Role assignment completed"
    );

    Ok(Json(response))
}

/// Recent admin activity from the audit log
#[utoipa::path(
    get,
    path = "/api/v1/rbac/activity-log",
    params(ActivityLogParams),
    responses(
        (status = 200, description = "Audit entries, newest first", body = ActivityLogResponse),
        (status = 403, description = "LogsView policy not satisfied", body = ErrorResponse)
    ),
    tag = "rbac"
)]
pub async fn activity_log(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    request_id: RequestId,
    Query(params): Query<ActivityLogParams>,
) -> Result<Json<ActivityLogResponse>> {
    let limit = params.limit.unwrap_or(DEFAULT_ACTIVITY_LOG_LIMIT);
    if limit == 0 {
        return Err(ApiError::ValidationError("limit must be at least 1".to_string()));
    }

    let query = ActivityLogQuery {
        limit,
        user_id: params.user_id,
    };
    let response = state
        .pipeline
        .send(&query, &context(principal, request_id), state.rbac.as_ref())
        .await?;

    Ok(Json(response))
}
