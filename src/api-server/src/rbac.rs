//! Admin RBAC commands and queries
//!
//! Each request type is dispatched through the authorization pipeline; the
//! [`RbacService`] is the terminal handler for all of them.

use crate::models::{
    ActivityLogResponse, AssignRoleResponse, CheckPermissionResponse, RolePermissionsResponse,
    RoleResponse,
};
use async_trait::async_trait;
use communitycar_authz::{
    catalog, AuditSink, AuthorizationRequirement, CacheableQuery, Permission,
    PermissionAuthorizationHandler, PermissionRegistry, PipelineContext, Request, RequestHandler,
    RequestMeta, Role,
};
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Upper bound on activity log page size
pub const MAX_ACTIVITY_LOG_LIMIT: usize = 500;

/// Domain failures raised by RBAC handlers
#[derive(Debug, Error)]
pub enum RbacError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),
}

// ===== Queries =====

/// All role definitions, most privileged first
#[derive(Debug, Clone, Default)]
pub struct ListRolesQuery {
    pub bypass_cache: bool,
}

impl RequestMeta for ListRolesQuery {
    fn name(&self) -> &'static str {
        "ListRolesQuery"
    }

    fn authorization(&self) -> Option<AuthorizationRequirement> {
        Some(AuthorizationRequirement::permission(catalog::ROLES_VIEW))
    }

    fn as_cacheable(&self) -> Option<&dyn CacheableQuery> {
        Some(self)
    }
}

impl CacheableQuery for ListRolesQuery {
    fn cache_key(&self) -> String {
        "all".to_string()
    }

    fn bypass_cache(&self) -> bool {
        self.bypass_cache
    }
}

impl Request for ListRolesQuery {
    type Response = Vec<RoleResponse>;
}

#[derive(Debug, Clone)]
pub struct RolePermissionsQuery {
    pub role: Role,
}

impl RequestMeta for RolePermissionsQuery {
    fn name(&self) -> &'static str {
        "RolePermissionsQuery"
    }

    fn authorization(&self) -> Option<AuthorizationRequirement> {
        Some(AuthorizationRequirement::permission(catalog::ROLES_VIEW))
    }

    fn as_cacheable(&self) -> Option<&dyn CacheableQuery> {
        Some(self)
    }
}

impl CacheableQuery for RolePermissionsQuery {
    fn cache_key(&self) -> String {
        format!("role={}", self.role)
    }
}

impl Request for RolePermissionsQuery {
    type Response = RolePermissionsResponse;
}

/// Roles the caller's role may administer
#[derive(Debug, Clone)]
pub struct ManageableRolesQuery {
    pub manager: Role,
}

impl RequestMeta for ManageableRolesQuery {
    fn name(&self) -> &'static str {
        "ManageableRolesQuery"
    }

    fn authorization(&self) -> Option<AuthorizationRequirement> {
        Some(AuthorizationRequirement::authenticated())
    }

    fn as_cacheable(&self) -> Option<&dyn CacheableQuery> {
        Some(self)
    }
}

impl CacheableQuery for ManageableRolesQuery {
    fn cache_key(&self) -> String {
        format!("manager={}", self.manager)
    }
}

impl Request for ManageableRolesQuery {
    type Response = Vec<RoleResponse>;
}

/// Whether the caller holds a permission
#[derive(Debug, Clone)]
pub struct CheckPermissionQuery {
    pub permission: Permission,
}

impl RequestMeta for CheckPermissionQuery {
    fn name(&self) -> &'static str {
        "CheckPermissionQuery"
    }

    fn authorization(&self) -> Option<AuthorizationRequirement> {
        Some(AuthorizationRequirement::authenticated())
    }
}

impl Request for CheckPermissionQuery {
    type Response = CheckPermissionResponse;
}

#[derive(Debug, Clone)]
pub struct ActivityLogQuery {
    pub limit: usize,
    pub user_id: Option<Uuid>,
}

impl RequestMeta for ActivityLogQuery {
    fn name(&self) -> &'static str {
        "ActivityLogQuery"
    }

    fn authorization(&self) -> Option<AuthorizationRequirement> {
        Some(AuthorizationRequirement::permission(catalog::LOGS_VIEW))
    }
}

impl Request for ActivityLogQuery {
    type Response = ActivityLogResponse;
}

// ===== Commands =====

/// Give a user a new admin role
#[derive(Debug, Clone)]
pub struct AssignRoleCommand {
    pub user_id: Uuid,
    pub role: Role,
    pub current_role: Option<Role>,
}

impl RequestMeta for AssignRoleCommand {
    fn name(&self) -> &'static str {
        "AssignRoleCommand"
    }

    fn entity_type(&self) -> &'static str {
        "UserRole"
    }

    fn authorization(&self) -> Option<AuthorizationRequirement> {
        Some(AuthorizationRequirement::roles([Role::UserAdmin]))
    }
}

impl Request for AssignRoleCommand {
    type Response = AssignRoleResponse;
}

// ===== Handler =====

/// Terminal handler for RBAC requests
pub struct RbacService {
    permissions: PermissionAuthorizationHandler,
    audit: Arc<dyn AuditSink>,
    assignments: DashMap<Uuid, Role>,
}

impl RbacService {
    pub fn new(registry: Arc<PermissionRegistry>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            permissions: PermissionAuthorizationHandler::new(registry),
            audit,
            assignments: DashMap::new(),
        }
    }

    fn registry(&self) -> &PermissionRegistry {
        self.permissions.registry()
    }

    /// Role recorded for a user by a previous assignment
    pub fn assigned_role(&self, user_id: Uuid) -> Option<Role> {
        self.assignments.get(&user_id).map(|r| *r)
    }
}

#[async_trait]
impl RequestHandler<ListRolesQuery> for RbacService {
    async fn handle(&self, _request: &ListRolesQuery, _ctx: &PipelineContext) -> anyhow::Result<Vec<RoleResponse>> {
        Ok(self.registry().definitions().into_iter().map(RoleResponse::from).collect())
    }
}

#[async_trait]
impl RequestHandler<RolePermissionsQuery> for RbacService {
    async fn handle(
        &self,
        request: &RolePermissionsQuery,
        _ctx: &PipelineContext,
    ) -> anyhow::Result<RolePermissionsResponse> {
        let definition = self
            .registry()
            .definition(request.role)
            .ok_or_else(|| RbacError::NotFound(format!("role {} is not defined", request.role)))?;

        Ok(RolePermissionsResponse {
            role: definition.role.to_string(),
            permissions: definition.permissions.iter().map(|p| p.to_string()).collect(),
        })
    }
}

#[async_trait]
impl RequestHandler<ManageableRolesQuery> for RbacService {
    async fn handle(
        &self,
        request: &ManageableRolesQuery,
        _ctx: &PipelineContext,
    ) -> anyhow::Result<Vec<RoleResponse>> {
        Ok(self
            .registry()
            .manageable_roles(request.manager)
            .into_iter()
            .map(RoleResponse::from)
            .collect())
    }
}

#[async_trait]
impl RequestHandler<CheckPermissionQuery> for RbacService {
    async fn handle(
        &self,
        request: &CheckPermissionQuery,
        ctx: &PipelineContext,
    ) -> anyhow::Result<CheckPermissionResponse> {
        let principal = ctx.principal().ok_or(RbacError::Unauthenticated)?;
        Ok(CheckPermissionResponse {
            permission: request.permission.to_string(),
            granted: self.permissions.holds(principal, &request.permission),
        })
    }
}

#[async_trait]
impl RequestHandler<ActivityLogQuery> for RbacService {
    async fn handle(&self, request: &ActivityLogQuery, _ctx: &PipelineContext) -> anyhow::Result<ActivityLogResponse> {
        let limit = request.limit.min(MAX_ACTIVITY_LOG_LIMIT);
        let entries = match request.user_id {
            Some(user_id) => self.audit.query_by_user(user_id, limit).await?,
            None => self.audit.recent(limit).await?,
        };

        Ok(ActivityLogResponse {
            count: entries.len(),
            entries,
        })
    }
}

#[async_trait]
impl RequestHandler<AssignRoleCommand> for RbacService {
    async fn handle(&self, request: &AssignRoleCommand, ctx: &PipelineContext) -> anyhow::Result<AssignRoleResponse> {
        let manager = ctx.principal().ok_or(RbacError::Unauthenticated)?;

        if manager.user_id == request.user_id {
            return Err(RbacError::Forbidden("cannot change your own role".to_string()).into());
        }

        let previous = self.assigned_role(request.user_id).or(request.current_role);
        if let Some(previous) = previous {
            if !self.registry().can_manage(manager.role, previous) {
                return Err(RbacError::Forbidden(format!(
                    "{} cannot manage users holding {}",
                    manager.role, previous
                ))
                .into());
            }
        }

        if !self.registry().can_manage(manager.role, request.role) {
            return Err(RbacError::Forbidden(format!("{} cannot assign {}", manager.role, request.role)).into());
        }

        self.assignments.insert(request.user_id, request.role);
        info!(
            user_id = %request.user_id,
            role = %request.role,
            assigned_by = %manager.user_id,
            "Role assigned"
        );

        Ok(AssignRoleResponse {
            user_id: request.user_id,
            role: request.role.to_string(),
            previous_role: previous.map(|r| r.to_string()),
            assigned_by: manager.user_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use communitycar_authz::{InMemoryAuditSink, Principal};

    fn service() -> RbacService {
        RbacService::new(
            Arc::new(PermissionRegistry::standard()),
            Arc::new(InMemoryAuditSink::default()),
        )
    }

    fn ctx(role: Role) -> PipelineContext {
        PipelineContext::new(Some(Principal::new(Uuid::new_v4(), role)))
    }

    #[tokio::test]
    async fn test_user_admin_assigns_moderator() {
        let service = service();
        let target = Uuid::new_v4();
        let command = AssignRoleCommand {
            user_id: target,
            role: Role::Moderator,
            current_role: None,
        };

        let response = tokio_test::assert_ok!(service.handle(&command, &ctx(Role::UserAdmin)).await);
        assert_eq!(response.role, "Moderator");
        assert_eq!(service.assigned_role(target), Some(Role::Moderator));
    }

    #[tokio::test]
    async fn test_cannot_assign_unmanaged_role() {
        let service = service();
        let command = AssignRoleCommand {
            user_id: Uuid::new_v4(),
            role: Role::ContentAdmin,
            current_role: None,
        };

        let err = service.handle(&command, &ctx(Role::UserAdmin)).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<RbacError>(), Some(RbacError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_cannot_demote_unmanaged_holder() {
        let service = service();
        let command = AssignRoleCommand {
            user_id: Uuid::new_v4(),
            role: Role::Moderator,
            current_role: Some(Role::Admin),
        };

        assert!(service.handle(&command, &ctx(Role::UserAdmin)).await.is_err());
    }

    #[tokio::test]
    async fn test_cannot_change_own_role() {
        let service = service();
        let ctx = ctx(Role::UserAdmin);
        let command = AssignRoleCommand {
            user_id: ctx.user_id().unwrap(),
            role: Role::Moderator,
            current_role: None,
        };

        assert!(service.handle(&command, &ctx).await.is_err());
    }

    #[tokio::test]
    async fn test_check_permission_uses_claims() {
        let service = service();
        let principal = Principal::new(Uuid::new_v4(), Role::Moderator).with_permission(catalog::LOGS_VIEW);
        let ctx = PipelineContext::new(Some(principal));

        let response = service
            .handle(
                &CheckPermissionQuery {
                    permission: catalog::LOGS_VIEW,
                },
                &ctx,
            )
            .await
            .unwrap();
        assert!(response.granted);
    }
}
