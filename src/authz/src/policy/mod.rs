//! Named authorization policies
//!
//! A policy is either a static role predicate or a dynamic
//! [`PermissionRequirement`] evaluated by the [`PermissionAuthorizationHandler`].
//! Policy names are stable identifiers referenced by routes.

pub mod decision;
pub mod handler;

pub use decision::{AuthorizationOutcome, DenialReason};
pub use handler::{AuthorizationRequirement, PermissionAuthorizationHandler, PermissionRequirement};

use crate::error::{AuthzError, Result};
use crate::permissions::catalog as p;
use crate::types::{Permission, Principal, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Well-known policy names
pub mod names {
    pub const SUPER_ADMIN: &str = "SuperAdmin";
    pub const USER_MANAGEMENT: &str = "UserManagement";
    pub const CONTENT_MANAGEMENT: &str = "ContentManagement";
    pub const COMMUNITY_MANAGEMENT: &str = "CommunityManagement";
    pub const MARKETPLACE_MANAGEMENT: &str = "MarketplaceManagement";
    pub const VIDEO_MANAGEMENT: &str = "VideoManagement";
    pub const PODCAST_MANAGEMENT: &str = "PodcastManagement";
    pub const SERVICES_MANAGEMENT: &str = "ServicesManagement";
    pub const SETTINGS_MANAGEMENT: &str = "SettingsManagement";
    pub const CMS_MANAGEMENT: &str = "CmsManagement";
    pub const ANALYTICS_ACCESS: &str = "AnalyticsAccess";

    pub const USERS_VIEW: &str = "UsersView";
    pub const USERS_MANAGE: &str = "UsersManage";
    pub const ROLES_VIEW: &str = "RolesView";
    pub const ROLES_MANAGE: &str = "RolesManage";
    pub const LOGS_VIEW: &str = "LogsView";
    pub const CONTENT_VIEW: &str = "ContentView";
    pub const CONTENT_MANAGE: &str = "ContentManage";
    pub const COMMUNITY_VIEW: &str = "CommunityView";
    pub const COMMUNITY_MANAGE: &str = "CommunityManage";
    pub const MARKETPLACE_VIEW: &str = "MarketplaceView";
    pub const MARKETPLACE_MANAGE: &str = "MarketplaceManage";
    pub const VIDEOS_VIEW: &str = "VideosView";
    pub const VIDEOS_MANAGE: &str = "VideosManage";
    pub const PODCASTS_VIEW: &str = "PodcastsView";
    pub const PODCASTS_MANAGE: &str = "PodcastsManage";
    pub const SERVICES_VIEW: &str = "ServicesView";
    pub const SERVICES_MANAGE: &str = "ServicesManage";
    pub const ANALYTICS_VIEW: &str = "AnalyticsView";
    pub const SETTINGS_VIEW: &str = "SettingsView";
    pub const SETTINGS_MANAGE: &str = "SettingsManage";
}

/// Static role predicate, optionally satisfied by a claim instead
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssertion {
    pub roles: Vec<Role>,
    #[serde(default)]
    pub or_claim: Option<Permission>,
}

/// How a policy is evaluated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PolicyEvaluation {
    Roles(RoleAssertion),
    Permission(PermissionRequirement),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub name: String,
    pub evaluation: PolicyEvaluation,
}

impl Policy {
    pub fn roles(name: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            name: name.into(),
            evaluation: PolicyEvaluation::Roles(RoleAssertion {
                roles: roles.into_iter().collect(),
                or_claim: None,
            }),
        }
    }

    pub fn permission(name: impl Into<String>, permission: Permission) -> Self {
        Self {
            name: name.into(),
            evaluation: PolicyEvaluation::Permission(PermissionRequirement::new(permission)),
        }
    }

    /// Also accept principals holding `claim` as an explicit permission
    pub fn or_claim(mut self, claim: Permission) -> Self {
        if let PolicyEvaluation::Roles(assertion) = &mut self.evaluation {
            assertion.or_claim = Some(claim);
        }
        self
    }
}

/// Registry of named policies; read-only once built
#[derive(Debug)]
pub struct PolicyRegistry {
    policies: BTreeMap<String, Policy>,
    handler: PermissionAuthorizationHandler,
}

impl PolicyRegistry {
    pub fn new(handler: PermissionAuthorizationHandler) -> Self {
        Self {
            policies: BTreeMap::new(),
            handler,
        }
    }

    /// Registry pre-populated with the standard admin policy set
    pub fn with_defaults(handler: PermissionAuthorizationHandler) -> Result<Self> {
        let mut registry = Self::new(handler);
        for policy in default_policies() {
            registry.register(policy)?;
        }
        debug!("Registered {} default policies", registry.len());
        Ok(registry)
    }

    /// Register a policy. Names are unique.
    pub fn register(&mut self, policy: Policy) -> Result<()> {
        if self.policies.contains_key(&policy.name) {
            return Err(AuthzError::DuplicatePolicy(policy.name));
        }
        self.policies.insert(policy.name.clone(), policy);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Policy> {
        self.policies.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn handler(&self) -> &PermissionAuthorizationHandler {
        &self.handler
    }

    /// Evaluate a named policy. Unknown names are denied.
    pub fn evaluate(&self, name: &str, principal: Option<&Principal>) -> AuthorizationOutcome {
        let Some(policy) = self.policies.get(name) else {
            warn!(policy = name, "Evaluated unregistered policy");
            return AuthorizationOutcome::denied(DenialReason::UnknownPolicy { name: name.to_string() });
        };

        match &policy.evaluation {
            PolicyEvaluation::Permission(requirement) => self.handler.evaluate(principal, requirement),
            PolicyEvaluation::Roles(assertion) => {
                let outcome = self.handler.evaluate_roles(principal, &assertion.roles);
                match (&outcome, &assertion.or_claim, principal) {
                    (AuthorizationOutcome::Denied { .. }, Some(claim), Some(principal))
                        if principal.permissions.contains(claim) =>
                    {
                        AuthorizationOutcome::Succeed
                    }
                    _ => outcome,
                }
            }
        }
    }

    /// Evaluate and map denials to errors (401 / 403)
    pub fn authorize(&self, name: &str, principal: Option<&Principal>) -> Result<()> {
        self.evaluate(name, principal).into_result()
    }
}

fn default_policies() -> Vec<Policy> {
    use names::*;

    vec![
        // Role policies
        Policy::roles(SUPER_ADMIN, [Role::SuperAdmin]),
        Policy::roles(USER_MANAGEMENT, [Role::UserAdmin]),
        Policy::roles(CONTENT_MANAGEMENT, [Role::ContentAdmin]),
        Policy::roles(COMMUNITY_MANAGEMENT, [Role::CommunityAdmin]),
        Policy::roles(MARKETPLACE_MANAGEMENT, [Role::MarketplaceAdmin]),
        Policy::roles(VIDEO_MANAGEMENT, [Role::VideoAdmin]),
        Policy::roles(PODCAST_MANAGEMENT, [Role::PodcastAdmin]),
        Policy::roles(SERVICES_MANAGEMENT, [Role::ServicesAdmin]),
        Policy::roles(SETTINGS_MANAGEMENT, [Role::SettingsAdmin]),
        Policy::roles(CMS_MANAGEMENT, [Role::CmsAdmin]),
        Policy::roles(ANALYTICS_ACCESS, [Role::AnalyticsAdmin]).or_claim(p::ANALYTICS_VIEW),
        // Permission policies
        Policy::permission(USERS_VIEW, p::USERS_VIEW),
        Policy::permission(USERS_MANAGE, p::USERS_EDIT),
        Policy::permission(ROLES_VIEW, p::ROLES_VIEW),
        Policy::permission(ROLES_MANAGE, p::ROLES_MANAGE),
        Policy::permission(LOGS_VIEW, p::LOGS_VIEW),
        Policy::permission(CONTENT_VIEW, p::CONTENT_VIEW),
        Policy::permission(CONTENT_MANAGE, p::CONTENT_EDIT),
        Policy::permission(COMMUNITY_VIEW, p::COMMUNITY_VIEW),
        Policy::permission(COMMUNITY_MANAGE, p::COMMUNITY_MODERATE),
        Policy::permission(MARKETPLACE_VIEW, p::MARKETPLACE_VIEW),
        Policy::permission(MARKETPLACE_MANAGE, p::MARKETPLACE_MANAGE),
        Policy::permission(VIDEOS_VIEW, p::VIDEOS_VIEW),
        Policy::permission(VIDEOS_MANAGE, p::VIDEOS_EDIT),
        Policy::permission(PODCASTS_VIEW, p::PODCASTS_VIEW),
        Policy::permission(PODCASTS_MANAGE, p::PODCASTS_EDIT),
        Policy::permission(SERVICES_VIEW, p::SERVICES_VIEW),
        Policy::permission(SERVICES_MANAGE, p::SERVICES_MAINTENANCE_MANAGE),
        Policy::permission(ANALYTICS_VIEW, p::ANALYTICS_VIEW),
        Policy::permission(SETTINGS_VIEW, p::SETTINGS_VIEW),
        Policy::permission(SETTINGS_MANAGE, p::SETTINGS_EDIT),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::PermissionRegistry;
    use std::sync::Arc;
    use uuid::Uuid;

    fn registry() -> PolicyRegistry {
        let handler = PermissionAuthorizationHandler::new(Arc::new(PermissionRegistry::standard()));
        PolicyRegistry::with_defaults(handler).unwrap()
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = registry();
        let err = registry
            .register(Policy::roles(names::SUPER_ADMIN, [Role::Admin]))
            .unwrap_err();
        assert!(matches!(err, AuthzError::DuplicatePolicy(_)));
    }

    #[test]
    fn test_unknown_policy_denied() {
        let principal = Principal::new(Uuid::new_v4(), Role::SuperAdmin);
        let outcome = registry().evaluate("DoesNotExist", Some(&principal));
        assert!(matches!(
            outcome,
            AuthorizationOutcome::Denied {
                reason: DenialReason::UnknownPolicy { .. }
            }
        ));
    }

    #[test]
    fn test_content_admin_scenarios() {
        let registry = registry();
        let principal = Principal::new(Uuid::new_v4(), Role::ContentAdmin);
        assert!(registry.authorize(names::CONTENT_MANAGE, Some(&principal)).is_ok());

        let err = registry
            .authorize(names::USER_MANAGEMENT, Some(&principal))
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn test_management_policies_admit_only_their_area_admin() {
        let registry = registry();
        let cases = [
            (names::USER_MANAGEMENT, Role::UserAdmin),
            (names::CONTENT_MANAGEMENT, Role::ContentAdmin),
            (names::COMMUNITY_MANAGEMENT, Role::CommunityAdmin),
            (names::MARKETPLACE_MANAGEMENT, Role::MarketplaceAdmin),
            (names::VIDEO_MANAGEMENT, Role::VideoAdmin),
            (names::PODCAST_MANAGEMENT, Role::PodcastAdmin),
            (names::SERVICES_MANAGEMENT, Role::ServicesAdmin),
            (names::SETTINGS_MANAGEMENT, Role::SettingsAdmin),
            (names::CMS_MANAGEMENT, Role::CmsAdmin),
            (names::ANALYTICS_ACCESS, Role::AnalyticsAdmin),
        ];

        for (policy, area_admin) in cases {
            for role in Role::ALL {
                let principal = Principal::new(Uuid::new_v4(), role);
                let expected = role == Role::SuperAdmin || role == area_admin;
                assert_eq!(
                    registry.evaluate(policy, Some(&principal)).is_allowed(),
                    expected,
                    "{} as {}",
                    policy,
                    role
                );
            }
        }
    }

    #[test]
    fn test_admin_denied_user_management() {
        let principal = Principal::new(Uuid::new_v4(), Role::Admin);
        let err = registry()
            .authorize(names::USER_MANAGEMENT, Some(&principal))
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn test_anonymous_gets_401() {
        let err = registry().authorize(names::USERS_VIEW, None).unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn test_analytics_access_accepts_claim() {
        let registry = registry();
        let moderator = Principal::new(Uuid::new_v4(), Role::Moderator);
        assert!(!registry.evaluate(names::ANALYTICS_ACCESS, Some(&moderator)).is_allowed());

        let with_claim = moderator.with_permission(p::ANALYTICS_VIEW);
        assert!(registry.evaluate(names::ANALYTICS_ACCESS, Some(&with_claim)).is_allowed());
    }

    #[test]
    fn test_super_admin_passes_all_defaults() {
        let registry = registry();
        let principal = Principal::new(Uuid::new_v4(), Role::SuperAdmin);
        let names: Vec<String> = registry.names().map(str::to_string).collect();
        for name in names {
            assert!(registry.evaluate(&name, Some(&principal)).is_allowed(), "{}", name);
        }
    }
}
