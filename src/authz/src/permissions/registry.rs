//! Role definitions and the role-management hierarchy

use super::catalog as p;
use crate::error::{AuthzError, Result};
use crate::types::{Permission, Role};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// ContentAdmin specialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentSpecialization {
    Community,
    Videos,
    Podcasts,
    /// Union of every specialization
    All,
}

/// Static description of one role
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDefinition {
    pub role: Role,
    pub display_name: String,
    pub description: String,
    /// Lower is more privileged. Display ordering only.
    pub level: u8,
    pub permissions: BTreeSet<Permission>,
    pub can_manage_roles: BTreeSet<Role>,
}

impl RoleDefinition {
    pub fn new(role: Role, display_name: impl Into<String>, level: u8) -> Self {
        Self {
            role,
            display_name: display_name.into(),
            description: String::new(),
            level,
            permissions: BTreeSet::new(),
            can_manage_roles: BTreeSet::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_permissions<'a>(mut self, permissions: impl IntoIterator<Item = &'a Permission>) -> Self {
        self.permissions.extend(permissions.into_iter().cloned());
        self
    }

    pub fn managing(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.can_manage_roles.extend(roles);
        self
    }
}

/// Read-only table of role definitions.
///
/// Built once at startup and shared behind an `Arc`; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct PermissionRegistry {
    definitions: BTreeMap<Role, RoleDefinition>,
}

impl PermissionRegistry {
    /// Build a registry from explicit definitions, validating invariants
    pub fn new(definitions: impl IntoIterator<Item = RoleDefinition>) -> Result<Self> {
        let registry = Self {
            definitions: definitions.into_iter().map(|d| (d.role, d)).collect(),
        };
        registry.validate()?;
        Ok(registry)
    }

    /// The built-in CommunityCar role table
    pub fn standard() -> Self {
        Self {
            definitions: standard_definitions().into_iter().map(|d| (d.role, d)).collect(),
        }
    }

    /// Check structural invariants of the role table.
    ///
    /// * every role has a definition
    /// * no role manages itself
    /// * SuperAdmin manages every other role
    /// * the management relation is acyclic
    pub fn validate(&self) -> Result<()> {
        for role in Role::ALL {
            if !self.definitions.contains_key(&role) {
                return Err(AuthzError::InvalidRegistry(format!("missing definition for {}", role)));
            }
        }

        for definition in self.definitions.values() {
            if definition.can_manage_roles.contains(&definition.role) {
                return Err(AuthzError::InvalidRegistry(format!(
                    "{} cannot manage itself",
                    definition.role
                )));
            }
        }

        if let Some(super_admin) = self.definitions.get(&Role::SuperAdmin) {
            for role in Role::ALL.into_iter().filter(|r| *r != Role::SuperAdmin) {
                if !super_admin.can_manage_roles.contains(&role) {
                    return Err(AuthzError::InvalidRegistry(format!(
                        "SuperAdmin must manage {}",
                        role
                    )));
                }
            }
        }

        self.check_acyclic()?;

        debug!("Role registry validated: {} roles", self.definitions.len());
        Ok(())
    }

    fn check_acyclic(&self) -> Result<()> {
        // DFS over the management graph; any back edge is a cycle.
        fn visit(
            registry: &PermissionRegistry,
            role: Role,
            on_stack: &mut BTreeSet<Role>,
            done: &mut BTreeSet<Role>,
        ) -> Result<()> {
            if done.contains(&role) {
                return Ok(());
            }
            if !on_stack.insert(role) {
                return Err(AuthzError::InvalidRegistry(format!(
                    "management cycle through {}",
                    role
                )));
            }
            if let Some(definition) = registry.definitions.get(&role) {
                for managed in &definition.can_manage_roles {
                    visit(registry, *managed, on_stack, done)?;
                }
            }
            on_stack.remove(&role);
            done.insert(role);
            Ok(())
        }

        let mut done = BTreeSet::new();
        for role in self.definitions.keys() {
            visit(self, *role, &mut BTreeSet::new(), &mut done)?;
        }
        Ok(())
    }

    pub fn definition(&self, role: Role) -> Option<&RoleDefinition> {
        self.definitions.get(&role)
    }

    /// All definitions, most privileged first
    pub fn definitions(&self) -> Vec<&RoleDefinition> {
        let mut definitions: Vec<_> = self.definitions.values().collect();
        definitions.sort_by_key(|d| (d.level, d.role));
        definitions
    }

    /// Permissions granted by a role. SuperAdmin yields the wildcard only.
    pub fn permissions_for_role(&self, role: Role) -> BTreeSet<Permission> {
        self.definitions
            .get(&role)
            .map(|d| d.permissions.clone())
            .unwrap_or_default()
    }

    /// Union of the permissions of several roles
    pub fn permissions_for_roles(&self, roles: impl IntoIterator<Item = Role>) -> BTreeSet<Permission> {
        roles
            .into_iter()
            .flat_map(|role| self.permissions_for_role(role))
            .collect()
    }

    /// Whether `manager` may administer principals holding `target`.
    ///
    /// Decided only by the explicit `can_manage_roles` sets; role levels are
    /// never consulted.
    pub fn can_manage(&self, manager: Role, target: Role) -> bool {
        if manager == target {
            return false;
        }
        if manager == Role::SuperAdmin {
            return true;
        }
        self.definitions
            .get(&manager)
            .map(|d| d.can_manage_roles.contains(&target))
            .unwrap_or(false)
    }

    /// Definitions of the roles `manager` may administer, by level
    pub fn manageable_roles(&self, manager: Role) -> Vec<&RoleDefinition> {
        self.definitions()
            .into_iter()
            .filter(|d| self.can_manage(manager, d.role))
            .collect()
    }

    /// Privilege level; lower is more privileged. Not for authorization.
    pub fn role_level(&self, role: Role) -> u8 {
        self.definitions.get(&role).map(|d| d.level).unwrap_or(u8::MAX)
    }

    /// Whether a permission is allowed for a role by its definition alone
    pub fn is_permission_allowed_for_role(&self, role: Role, permission: &Permission) -> bool {
        self.definitions
            .get(&role)
            .map(|d| has_permission(&d.permissions, permission))
            .unwrap_or(false)
    }
}

impl Default for PermissionRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Wildcard-aware membership test
pub fn has_permission<'a>(
    granted: impl IntoIterator<Item = &'a Permission>,
    required: &Permission,
) -> bool {
    granted
        .into_iter()
        .any(|permission| permission == &p::ALL || permission == required)
}

/// Permissions for a ContentAdmin with the given specialization
pub fn content_admin_permissions(specialization: ContentSpecialization) -> BTreeSet<Permission> {
    let community = [
        &p::CONTENT_COMMUNITY_VIEW,
        &p::CONTENT_COMMUNITY_CREATE,
        &p::CONTENT_COMMUNITY_EDIT,
        &p::CONTENT_COMMUNITY_DELETE,
        &p::CONTENT_COMMUNITY_MODERATE,
        &p::CONTENT_COMMUNITY_QA_VIEW,
        &p::CONTENT_COMMUNITY_QA_MANAGE,
        &p::CONTENT_COMMUNITY_QA_MODERATE,
        &p::CONTENT_COMMUNITY_NEWS_VIEW,
        &p::CONTENT_COMMUNITY_NEWS_MANAGE,
        &p::CONTENT_COMMUNITY_PAGES_VIEW,
        &p::CONTENT_COMMUNITY_PAGES_MANAGE,
        &p::ANALYTICS_VIEW,
    ];
    let videos = [
        &p::CONTENT_VIDEOS_VIEW,
        &p::CONTENT_VIDEOS_CREATE,
        &p::CONTENT_VIDEOS_EDIT,
        &p::CONTENT_VIDEOS_DELETE,
        &p::CONTENT_VIDEOS_MODERATE,
        &p::CONTENT_LIVESTREAM_MANAGE,
        &p::ANALYTICS_VIEW,
    ];
    let podcasts = [
        &p::CONTENT_PODCASTS_VIEW,
        &p::CONTENT_PODCASTS_CREATE,
        &p::CONTENT_PODCASTS_EDIT,
        &p::CONTENT_PODCASTS_DELETE,
        &p::CONTENT_PODCASTS_MODERATE,
        &p::ANALYTICS_VIEW,
    ];

    let selected: Vec<&Permission> = match specialization {
        ContentSpecialization::Community => community.to_vec(),
        ContentSpecialization::Videos => videos.to_vec(),
        ContentSpecialization::Podcasts => podcasts.to_vec(),
        ContentSpecialization::All => community
            .iter()
            .chain(videos.iter())
            .chain(podcasts.iter())
            .copied()
            .collect(),
    };

    selected.into_iter().cloned().collect()
}

fn standard_definitions() -> Vec<RoleDefinition> {
    let everyone_but_super = Role::ALL.into_iter().filter(|r| *r != Role::SuperAdmin);
    let delegated = Role::ALL
        .into_iter()
        .filter(|r| !matches!(r, Role::SuperAdmin | Role::Admin));

    vec![
        RoleDefinition::new(Role::SuperAdmin, "Super Administrator", 0)
            .with_description("Unrestricted access to every admin area")
            .with_permissions([&p::ALL])
            .managing(everyone_but_super),
        RoleDefinition::new(Role::Admin, "Administrator", 1)
            .with_description("User administration and read access across areas")
            .with_permissions([
                &p::USERS_VIEW,
                &p::USERS_EDIT,
                &p::USERS_MANAGE,
                &p::ROLES_VIEW,
                &p::LOGS_VIEW,
                &p::ANALYTICS_VIEW,
                &p::REPORTS_GENERATE,
                &p::CONTENT_VIEW,
                &p::CONTENT_COMMUNITY_VIEW,
                &p::CONTENT_VIDEOS_VIEW,
                &p::CONTENT_PODCASTS_VIEW,
                &p::COMMUNITY_VIEW,
                &p::SERVICES_VIEW,
                &p::MARKETPLACE_VIEW,
                &p::SETTINGS_VIEW,
            ])
            .managing(delegated),
        RoleDefinition::new(Role::UserAdmin, "User Administrator", 2)
            .with_description("Manages user accounts and moderator assignments")
            .with_permissions([
                &p::USERS_VIEW,
                &p::USERS_EDIT,
                &p::USERS_MANAGE,
                &p::ROLES_VIEW,
                &p::ROLES_ASSIGN,
                &p::LOGS_VIEW,
            ])
            .managing([Role::Moderator]),
        RoleDefinition::new(Role::ContentAdmin, "Content Administrator", 2)
            .with_description("Community, video and podcast content")
            .with_permissions([&p::CONTENT_VIEW, &p::CONTENT_EDIT])
            .with_permissions(&content_admin_permissions(ContentSpecialization::All))
            .managing([Role::Moderator]),
        RoleDefinition::new(Role::CommunityAdmin, "Community Administrator", 2)
            .with_description("Community posts, comments and reports")
            .with_permissions([&p::COMMUNITY_VIEW, &p::COMMUNITY_MODERATE])
            .with_permissions(&content_admin_permissions(ContentSpecialization::Community))
            .managing([Role::Moderator]),
        RoleDefinition::new(Role::MarketplaceAdmin, "Marketplace Administrator", 2)
            .with_description("Listings, categories, orders and marketplace reports")
            .with_permissions([
                &p::MARKETPLACE_VIEW,
                &p::MARKETPLACE_MANAGE,
                &p::MARKETPLACE_LISTINGS_MANAGE,
                &p::MARKETPLACE_CATEGORIES_MANAGE,
                &p::MARKETPLACE_ORDERS_VIEW,
                &p::MARKETPLACE_REPORTS_HANDLE,
                &p::ANALYTICS_VIEW,
            ]),
        RoleDefinition::new(Role::VideoAdmin, "Video Administrator", 3)
            .with_permissions([&p::VIDEOS_VIEW, &p::VIDEOS_EDIT])
            .with_permissions(&content_admin_permissions(ContentSpecialization::Videos)),
        RoleDefinition::new(Role::PodcastAdmin, "Podcast Administrator", 3)
            .with_permissions([&p::PODCASTS_VIEW, &p::PODCASTS_EDIT])
            .with_permissions(&content_admin_permissions(ContentSpecialization::Podcasts)),
        RoleDefinition::new(Role::ServicesAdmin, "Services Administrator", 3)
            .with_description("Maintenance, roadside, repair, driving school and provider services")
            .with_permissions([
                &p::SERVICES_VIEW,
                &p::SERVICES_MAINTENANCE_MANAGE,
                &p::SERVICES_ROADSIDE_MANAGE,
                &p::SERVICES_REPAIR_MANAGE,
                &p::SERVICES_DRIVING_SCHOOL_MANAGE,
                &p::SERVICES_PROVIDERS_MANAGE,
                &p::ANALYTICS_VIEW,
            ]),
        RoleDefinition::new(Role::AnalyticsAdmin, "Analytics Administrator", 3)
            .with_permissions([&p::ANALYTICS_VIEW, &p::REPORTS_GENERATE]),
        RoleDefinition::new(Role::SettingsAdmin, "Settings Administrator", 3)
            .with_permissions([&p::SETTINGS_VIEW, &p::SETTINGS_EDIT, &p::SETTINGS_MANAGE]),
        RoleDefinition::new(Role::CmsAdmin, "CMS Administrator", 3)
            .with_description("Static pages only: about, FAQ, legal, careers")
            .with_permissions([
                &p::CMS_ABOUT_MANAGE,
                &p::CMS_FAQ_MANAGE,
                &p::CMS_LEGAL_MANAGE,
                &p::CMS_CAREERS_MANAGE,
                &p::ANALYTICS_VIEW,
            ]),
        RoleDefinition::new(Role::Moderator, "Moderator", 4)
            .with_description("Community moderation")
            .with_permissions([
                &p::COMMUNITY_VIEW,
                &p::COMMUNITY_MODERATE,
                &p::CONTENT_COMMUNITY_VIEW,
                &p::CONTENT_COMMUNITY_MODERATE,
                &p::CONTENT_COMMUNITY_QA_MODERATE,
            ]),
    ]
}
