//! Role registry and policy evaluation tests

use communitycar_authz::{
    catalog,
    policy::{names, AuthorizationOutcome, DenialReason},
    ContentSpecialization, Permission, PermissionAuthorizationHandler, PermissionRegistry,
    PermissionRequirement, Policy, PolicyRegistry, Principal, Role,
};
use proptest::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

fn policies() -> PolicyRegistry {
    let handler = PermissionAuthorizationHandler::new(Arc::new(PermissionRegistry::standard()));
    PolicyRegistry::with_defaults(handler).unwrap()
}

fn any_role() -> impl Strategy<Value = Role> {
    prop::sample::select(Role::ALL.to_vec())
}

fn any_permission() -> impl Strategy<Value = Permission> {
    prop::sample::select(catalog::all().cloned().collect::<Vec<_>>())
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #[test]
    fn prop_missing_permission_is_denied(role in any_role(), permission in any_permission()) {
        prop_assume!(role != Role::SuperAdmin);

        let registry = Arc::new(PermissionRegistry::standard());
        prop_assume!(!registry.permissions_for_role(role).contains(&permission));

        let handler = PermissionAuthorizationHandler::new(registry);
        let principal = Principal::new(Uuid::new_v4(), role);
        let outcome = handler.evaluate(Some(&principal), &PermissionRequirement::new(permission.clone()));

        prop_assert_eq!(
            outcome,
            AuthorizationOutcome::denied(DenialReason::MissingPermission { permission })
        );
    }

    #[test]
    fn prop_granted_permission_succeeds(role in any_role()) {
        let registry = Arc::new(PermissionRegistry::standard());
        let granted = registry.permissions_for_role(role);
        let handler = PermissionAuthorizationHandler::new(registry);
        let principal = Principal::new(Uuid::new_v4(), role);

        for permission in granted {
            prop_assert!(handler
                .evaluate(Some(&principal), &PermissionRequirement::new(permission))
                .is_allowed());
        }
    }

    #[test]
    fn prop_no_role_manages_itself(role in any_role()) {
        let registry = PermissionRegistry::standard();
        prop_assert!(!registry.can_manage(role, role));
        let definition = registry.definition(role).unwrap();
        prop_assert!(!definition.can_manage_roles.contains(&role));
    }

    #[test]
    fn prop_management_is_antisymmetric(a in any_role(), b in any_role()) {
        let registry = PermissionRegistry::standard();
        prop_assert!(!(registry.can_manage(a, b) && registry.can_manage(b, a)));
    }

    #[test]
    fn prop_super_admin_passes_every_policy(index in 0usize..64) {
        let registry = policies();
        let names: Vec<String> = registry.names().map(str::to_string).collect();
        let name = &names[index % names.len()];
        let principal = Principal::new(Uuid::new_v4(), Role::SuperAdmin);
        prop_assert!(registry.evaluate(name, Some(&principal)).is_allowed());
    }

    #[test]
    fn prop_anonymous_is_always_unauthenticated(index in 0usize..64) {
        let registry = policies();
        let names: Vec<String> = registry.names().map(str::to_string).collect();
        let name = &names[index % names.len()];
        let err = registry.authorize(name, None).unwrap_err();
        prop_assert_eq!(err.status_code(), 401);
    }
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn test_content_admin_manage_and_user_management() {
    let registry = policies();
    let principal = Principal::new(Uuid::new_v4(), Role::ContentAdmin);

    assert!(registry.authorize(names::CONTENT_MANAGE, Some(&principal)).is_ok());
    assert_eq!(
        registry
            .authorize(names::USER_MANAGEMENT, Some(&principal))
            .unwrap_err()
            .status_code(),
        403
    );
}

#[test]
fn test_anonymous_permission_policy_is_401() {
    let err = policies().authorize(names::MARKETPLACE_VIEW, None).unwrap_err();
    assert_eq!(err.status_code(), 401);
}

#[test]
fn test_claim_extends_role_for_permission_policy() {
    let registry = policies();
    let moderator = Principal::new(Uuid::new_v4(), Role::Moderator);
    assert!(registry.authorize(names::LOGS_VIEW, Some(&moderator)).is_err());

    let moderator = moderator.with_permission(catalog::LOGS_VIEW);
    assert!(registry.authorize(names::LOGS_VIEW, Some(&moderator)).is_ok());
}

#[test]
fn test_custom_policy_registration() {
    let mut registry = policies();
    registry
        .register(Policy::permission("ReportsGenerate", catalog::REPORTS_GENERATE))
        .unwrap();

    let analyst = Principal::new(Uuid::new_v4(), Role::AnalyticsAdmin);
    assert!(registry.evaluate("ReportsGenerate", Some(&analyst)).is_allowed());
    assert!(registry
        .register(Policy::permission("ReportsGenerate", catalog::REPORTS_GENERATE))
        .is_err());
}

#[test]
fn test_super_admin_effective_permissions_are_the_wildcard() {
    let registry = Arc::new(PermissionRegistry::standard());
    let handler = PermissionAuthorizationHandler::new(registry);
    let principal = Principal::new(Uuid::new_v4(), Role::SuperAdmin);

    let effective = handler.effective_permissions(&principal);
    assert_eq!(effective.into_iter().collect::<Vec<_>>(), vec![catalog::ALL]);
}

#[test]
fn test_admin_manageable_roles() {
    let registry = PermissionRegistry::standard();
    let manageable: Vec<Role> = registry
        .manageable_roles(Role::Admin)
        .into_iter()
        .map(|d| d.role)
        .collect();

    assert!(manageable.contains(&Role::UserAdmin));
    assert!(manageable.contains(&Role::Moderator));
    assert!(!manageable.contains(&Role::Admin));
    assert!(!manageable.contains(&Role::SuperAdmin));
    assert!(registry.manageable_roles(Role::Moderator).is_empty());
}

#[test]
fn test_role_levels_order_display_only() {
    let registry = PermissionRegistry::standard();
    assert_eq!(registry.role_level(Role::SuperAdmin), 0);
    assert_eq!(registry.role_level(Role::Admin), 1);
    assert!(registry.role_level(Role::Moderator) > registry.role_level(Role::CmsAdmin));

    // A lower level is not enough to manage a role
    assert!(registry.role_level(Role::ContentAdmin) < registry.role_level(Role::VideoAdmin));
    assert!(!registry.can_manage(Role::ContentAdmin, Role::VideoAdmin));
}

#[test]
fn test_content_admin_specializations_feed_role_table() {
    let registry = PermissionRegistry::standard();
    let content_admin = registry.permissions_for_role(Role::ContentAdmin);
    let all = communitycar_authz::permissions::content_admin_permissions(ContentSpecialization::All);
    assert!(content_admin.is_superset(&all));

    let video_admin = registry.permissions_for_role(Role::VideoAdmin);
    assert!(video_admin.contains(&catalog::CONTENT_LIVESTREAM_MANAGE));
    assert!(!video_admin.contains(&catalog::CONTENT_PODCASTS_EDIT));
}
