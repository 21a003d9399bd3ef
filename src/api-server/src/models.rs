use communitycar_authz::{AuditEntry, RoleDefinition};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Role definition as exposed to admin tooling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleResponse {
    /// Wire name of the role, e.g. `ContentAdmin`
    pub role: String,

    pub display_name: String,

    pub description: String,

    /// Lower is more privileged (display ordering only)
    pub level: u8,

    pub permissions: Vec<String>,

    pub can_manage_roles: Vec<String>,
}

impl From<&RoleDefinition> for RoleResponse {
    fn from(definition: &RoleDefinition) -> Self {
        Self {
            role: definition.role.to_string(),
            display_name: definition.display_name.clone(),
            description: definition.description.clone(),
            level: definition.level,
            permissions: definition.permissions.iter().map(|p| p.to_string()).collect(),
            can_manage_roles: definition.can_manage_roles.iter().map(|r| r.to_string()).collect(),
        }
    }
}

/// Permissions granted by one role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RolePermissionsResponse {
    pub role: String,
    pub permissions: Vec<String>,
}

/// Permission check for the calling principal
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CheckPermissionRequest {
    /// Permission identifier, e.g. `admin.users.view`
    #[validate(length(min = 1, max = 200))]
    pub permission: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CheckPermissionResponse {
    pub permission: String,
    pub granted: bool,
}

/// Role assignment request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignRoleRequest {
    /// User receiving the role
    pub user_id: Uuid,

    /// Role to assign
    #[validate(length(min = 1, max = 50))]
    pub role: String,

    /// Role the user currently holds, when known to the caller
    #[serde(default)]
    #[validate(length(min = 1, max = 50))]
    pub current_role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignRoleResponse {
    pub user_id: Uuid,
    pub role: String,
    pub previous_role: Option<String>,
    pub assigned_by: Uuid,
}

/// Activity log filters
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogParams {
    /// Maximum entries to return (default 50, max 500)
    pub limit: Option<usize>,

    /// Only entries written on behalf of this user
    pub user_id: Option<Uuid>,
}

/// Recent audit entries, newest first
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActivityLogResponse {
    #[schema(value_type = Vec<Object>)]
    pub entries: Vec<AuditEntry>,
    pub count: usize,
}

/// Error body returned by every failing endpoint
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub status: u16,
}

/// Query flags for cacheable listings
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
pub struct RefreshParams {
    /// Skip the cache and rebuild the response
    #[serde(default)]
    pub refresh: bool,
}
