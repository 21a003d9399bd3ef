//! Permission authorization handler

use super::decision::{AuthorizationOutcome, DenialReason};
use crate::permissions::{has_permission, PermissionRegistry};
use crate::types::{Permission, Principal, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Requirement satisfied by holding one permission
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionRequirement {
    pub permission: Permission,
}

impl PermissionRequirement {
    pub fn new(permission: Permission) -> Self {
        Self { permission }
    }
}

/// Role and/or permission requirement declared by a request.
///
/// Empty `roles` means any role; `None` permission means no permission check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequirement {
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub permission: Option<Permission>,
}

impl AuthorizationRequirement {
    /// Any authenticated principal
    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn roles(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            roles: roles.into_iter().collect(),
            permission: None,
        }
    }

    pub fn permission(permission: Permission) -> Self {
        Self {
            roles: Vec::new(),
            permission: Some(permission),
        }
    }

    pub fn and_permission(mut self, permission: Permission) -> Self {
        self.permission = Some(permission);
        self
    }
}

/// Evaluates permission requirements against a principal's role and claims.
///
/// Fail-closed: a missing principal is never granted anything.
#[derive(Debug, Clone)]
pub struct PermissionAuthorizationHandler {
    registry: Arc<PermissionRegistry>,
}

impl PermissionAuthorizationHandler {
    pub fn new(registry: Arc<PermissionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &PermissionRegistry {
        &self.registry
    }

    /// Role permissions merged with explicit claims
    pub fn effective_permissions(&self, principal: &Principal) -> BTreeSet<Permission> {
        let mut permissions = self.registry.permissions_for_role(principal.role);
        permissions.extend(principal.permissions.iter().cloned());
        permissions
    }

    pub fn holds(&self, principal: &Principal, permission: &Permission) -> bool {
        principal.is_super_admin() || has_permission(&self.effective_permissions(principal), permission)
    }

    pub fn evaluate(
        &self,
        principal: Option<&Principal>,
        requirement: &PermissionRequirement,
    ) -> AuthorizationOutcome {
        let Some(principal) = principal else {
            return AuthorizationOutcome::denied(DenialReason::Unauthenticated);
        };

        if self.holds(principal, &requirement.permission) {
            AuthorizationOutcome::Succeed
        } else {
            debug!(
                user_id = %principal.user_id,
                role = %principal.role,
                permission = %requirement.permission,
                "Permission requirement not met"
            );
            AuthorizationOutcome::denied(DenialReason::MissingPermission {
                permission: requirement.permission.clone(),
            })
        }
    }

    /// Role membership check. SuperAdmin always passes.
    pub fn evaluate_roles(&self, principal: Option<&Principal>, allowed: &[Role]) -> AuthorizationOutcome {
        let Some(principal) = principal else {
            return AuthorizationOutcome::denied(DenialReason::Unauthenticated);
        };

        if allowed.is_empty() || principal.is_super_admin() || allowed.contains(&principal.role) {
            AuthorizationOutcome::Succeed
        } else {
            AuthorizationOutcome::denied(DenialReason::MissingRole {
                role: principal.role,
                allowed: allowed.to_vec(),
            })
        }
    }

    /// Combined role + permission requirement; both parts must hold
    pub fn evaluate_requirement(
        &self,
        principal: Option<&Principal>,
        requirement: &AuthorizationRequirement,
    ) -> AuthorizationOutcome {
        let roles = self.evaluate_roles(principal, &requirement.roles);
        if !roles.is_allowed() {
            return roles;
        }
        match &requirement.permission {
            Some(permission) => self.evaluate(principal, &PermissionRequirement::new(permission.clone())),
            None => AuthorizationOutcome::Succeed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::catalog as p;
    use uuid::Uuid;

    fn handler() -> PermissionAuthorizationHandler {
        PermissionAuthorizationHandler::new(Arc::new(PermissionRegistry::standard()))
    }

    #[test]
    fn test_anonymous_is_unauthenticated() {
        let outcome = handler().evaluate(None, &PermissionRequirement::new(p::USERS_VIEW));
        assert_eq!(outcome, AuthorizationOutcome::denied(DenialReason::Unauthenticated));
    }

    #[test]
    fn test_role_permission_grants() {
        let principal = Principal::new(Uuid::new_v4(), Role::SettingsAdmin);
        let h = handler();
        assert!(h.evaluate(Some(&principal), &PermissionRequirement::new(p::SETTINGS_EDIT)).is_allowed());
        assert!(!h.evaluate(Some(&principal), &PermissionRequirement::new(p::USERS_EDIT)).is_allowed());
    }

    #[test]
    fn test_claims_extend_role() {
        let principal = Principal::new(Uuid::new_v4(), Role::Moderator).with_permission(p::ANALYTICS_VIEW);
        assert!(handler()
            .evaluate(Some(&principal), &PermissionRequirement::new(p::ANALYTICS_VIEW))
            .is_allowed());
    }

    #[test]
    fn test_super_admin_passes_everything() {
        let principal = Principal::new(Uuid::new_v4(), Role::SuperAdmin);
        let h = handler();
        for permission in p::all() {
            assert!(h
                .evaluate(Some(&principal), &PermissionRequirement::new(permission.clone()))
                .is_allowed());
        }
        assert!(h.evaluate_roles(Some(&principal), &[Role::Moderator]).is_allowed());
    }

    #[test]
    fn test_combined_requirement() {
        let h = handler();
        let requirement = AuthorizationRequirement::roles([Role::Admin, Role::UserAdmin])
            .and_permission(p::ROLES_ASSIGN);

        let user_admin = Principal::new(Uuid::new_v4(), Role::UserAdmin);
        assert!(h.evaluate_requirement(Some(&user_admin), &requirement).is_allowed());

        // Admin has the role but not the permission
        let admin = Principal::new(Uuid::new_v4(), Role::Admin);
        assert!(!h.evaluate_requirement(Some(&admin), &requirement).is_allowed());

        let moderator = Principal::new(Uuid::new_v4(), Role::Moderator);
        assert!(matches!(
            h.evaluate_requirement(Some(&moderator), &requirement),
            AuthorizationOutcome::Denied {
                reason: DenialReason::MissingRole { .. }
            }
        ));
    }
}
