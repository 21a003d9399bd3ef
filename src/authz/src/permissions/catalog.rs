//! Permission identifiers, grouped by admin area
//!
//! Identifiers are part of the wire contract for externally issued claims and
//! must never change once released.

use crate::types::Permission;

/// Wildcard sentinel held only by SuperAdmin
pub const ALL: Permission = Permission::from_static("admin.all");

// ===== USERS & ROLES =====
pub const USERS_VIEW: Permission = Permission::from_static("admin.users.view");
pub const USERS_EDIT: Permission = Permission::from_static("admin.users.edit");
pub const USERS_MANAGE: Permission = Permission::from_static("admin.users.manage");
pub const ROLES_VIEW: Permission = Permission::from_static("admin.roles.view");
pub const ROLES_MANAGE: Permission = Permission::from_static("admin.roles.manage");
pub const ROLES_ASSIGN: Permission = Permission::from_static("admin.roles.assign");
pub const LOGS_VIEW: Permission = Permission::from_static("admin.logs.view");

// ===== CONTENT =====
pub const CONTENT_VIEW: Permission = Permission::from_static("admin.content.view");
pub const CONTENT_EDIT: Permission = Permission::from_static("admin.content.edit");

pub const CONTENT_COMMUNITY_VIEW: Permission = Permission::from_static("admin.content.community.view");
pub const CONTENT_COMMUNITY_CREATE: Permission = Permission::from_static("admin.content.community.create");
pub const CONTENT_COMMUNITY_EDIT: Permission = Permission::from_static("admin.content.community.edit");
pub const CONTENT_COMMUNITY_DELETE: Permission = Permission::from_static("admin.content.community.delete");
pub const CONTENT_COMMUNITY_MODERATE: Permission = Permission::from_static("admin.content.community.moderate");
pub const CONTENT_COMMUNITY_QA_VIEW: Permission = Permission::from_static("admin.content.community.qa.view");
pub const CONTENT_COMMUNITY_QA_MANAGE: Permission = Permission::from_static("admin.content.community.qa.manage");
pub const CONTENT_COMMUNITY_QA_MODERATE: Permission = Permission::from_static("admin.content.community.qa.moderate");
pub const CONTENT_COMMUNITY_NEWS_VIEW: Permission = Permission::from_static("admin.content.community.news.view");
pub const CONTENT_COMMUNITY_NEWS_MANAGE: Permission = Permission::from_static("admin.content.community.news.manage");
pub const CONTENT_COMMUNITY_PAGES_VIEW: Permission = Permission::from_static("admin.content.community.pages.view");
pub const CONTENT_COMMUNITY_PAGES_MANAGE: Permission = Permission::from_static("admin.content.community.pages.manage");

pub const CONTENT_VIDEOS_VIEW: Permission = Permission::from_static("admin.content.videos.view");
pub const CONTENT_VIDEOS_CREATE: Permission = Permission::from_static("admin.content.videos.create");
pub const CONTENT_VIDEOS_EDIT: Permission = Permission::from_static("admin.content.videos.edit");
pub const CONTENT_VIDEOS_DELETE: Permission = Permission::from_static("admin.content.videos.delete");
pub const CONTENT_VIDEOS_MODERATE: Permission = Permission::from_static("admin.content.videos.moderate");
pub const CONTENT_LIVESTREAM_MANAGE: Permission = Permission::from_static("admin.content.livestream.manage");

pub const CONTENT_PODCASTS_VIEW: Permission = Permission::from_static("admin.content.podcasts.view");
pub const CONTENT_PODCASTS_CREATE: Permission = Permission::from_static("admin.content.podcasts.create");
pub const CONTENT_PODCASTS_EDIT: Permission = Permission::from_static("admin.content.podcasts.edit");
pub const CONTENT_PODCASTS_DELETE: Permission = Permission::from_static("admin.content.podcasts.delete");
pub const CONTENT_PODCASTS_MODERATE: Permission = Permission::from_static("admin.content.podcasts.moderate");

// ===== COMMUNITY =====
pub const COMMUNITY_VIEW: Permission = Permission::from_static("admin.community.view");
pub const COMMUNITY_MODERATE: Permission = Permission::from_static("admin.community.moderate");

// ===== VIDEOS & PODCASTS (area level) =====
pub const VIDEOS_VIEW: Permission = Permission::from_static("admin.videos.view");
pub const VIDEOS_EDIT: Permission = Permission::from_static("admin.videos.edit");
pub const PODCASTS_VIEW: Permission = Permission::from_static("admin.podcasts.view");
pub const PODCASTS_EDIT: Permission = Permission::from_static("admin.podcasts.edit");

// ===== SERVICES =====
pub const SERVICES_VIEW: Permission = Permission::from_static("admin.services.view");
pub const SERVICES_MAINTENANCE_MANAGE: Permission = Permission::from_static("admin.services.maintenance.manage");
pub const SERVICES_ROADSIDE_MANAGE: Permission = Permission::from_static("admin.services.roadside.manage");
pub const SERVICES_REPAIR_MANAGE: Permission = Permission::from_static("admin.services.repair.manage");
pub const SERVICES_DRIVING_SCHOOL_MANAGE: Permission = Permission::from_static("admin.services.drivingschool.manage");
pub const SERVICES_PROVIDERS_MANAGE: Permission = Permission::from_static("admin.services.providers.manage");

// ===== MARKETPLACE =====
pub const MARKETPLACE_VIEW: Permission = Permission::from_static("admin.marketplace.view");
pub const MARKETPLACE_MANAGE: Permission = Permission::from_static("admin.marketplace.manage");
pub const MARKETPLACE_LISTINGS_MANAGE: Permission = Permission::from_static("admin.marketplace.listings.manage");
pub const MARKETPLACE_CATEGORIES_MANAGE: Permission = Permission::from_static("admin.marketplace.categories.manage");
pub const MARKETPLACE_ORDERS_VIEW: Permission = Permission::from_static("admin.marketplace.orders.view");
pub const MARKETPLACE_REPORTS_HANDLE: Permission = Permission::from_static("admin.marketplace.reports.handle");

// ===== ANALYTICS & REPORTS =====
pub const ANALYTICS_VIEW: Permission = Permission::from_static("admin.analytics.view");
pub const REPORTS_GENERATE: Permission = Permission::from_static("admin.reports.generate");

// ===== SETTINGS =====
pub const SETTINGS_VIEW: Permission = Permission::from_static("admin.settings.view");
pub const SETTINGS_EDIT: Permission = Permission::from_static("admin.settings.edit");
pub const SETTINGS_MANAGE: Permission = Permission::from_static("admin.settings.manage");

// ===== CMS (static pages) =====
pub const CMS_ABOUT_MANAGE: Permission = Permission::from_static("admin.cms.about.manage");
pub const CMS_FAQ_MANAGE: Permission = Permission::from_static("admin.cms.faq.manage");
pub const CMS_LEGAL_MANAGE: Permission = Permission::from_static("admin.cms.legal.manage");
pub const CMS_CAREERS_MANAGE: Permission = Permission::from_static("admin.cms.careers.manage");

/// Permissions belonging to one admin area
#[derive(Debug)]
pub struct PermissionGroup {
    pub area: &'static str,
    pub permissions: &'static [Permission],
}

/// Every enumerated permission, grouped by area. The wildcard is not listed.
pub static GROUPS: &[PermissionGroup] = &[
    PermissionGroup {
        area: "users",
        permissions: &[USERS_VIEW, USERS_EDIT, USERS_MANAGE, ROLES_VIEW, ROLES_MANAGE, ROLES_ASSIGN, LOGS_VIEW],
    },
    PermissionGroup {
        area: "content",
        permissions: &[
            CONTENT_VIEW,
            CONTENT_EDIT,
            CONTENT_COMMUNITY_VIEW,
            CONTENT_COMMUNITY_CREATE,
            CONTENT_COMMUNITY_EDIT,
            CONTENT_COMMUNITY_DELETE,
            CONTENT_COMMUNITY_MODERATE,
            CONTENT_COMMUNITY_QA_VIEW,
            CONTENT_COMMUNITY_QA_MANAGE,
            CONTENT_COMMUNITY_QA_MODERATE,
            CONTENT_COMMUNITY_NEWS_VIEW,
            CONTENT_COMMUNITY_NEWS_MANAGE,
            CONTENT_COMMUNITY_PAGES_VIEW,
            CONTENT_COMMUNITY_PAGES_MANAGE,
            CONTENT_VIDEOS_VIEW,
            CONTENT_VIDEOS_CREATE,
            CONTENT_VIDEOS_EDIT,
            CONTENT_VIDEOS_DELETE,
            CONTENT_VIDEOS_MODERATE,
            CONTENT_LIVESTREAM_MANAGE,
            CONTENT_PODCASTS_VIEW,
            CONTENT_PODCASTS_CREATE,
            CONTENT_PODCASTS_EDIT,
            CONTENT_PODCASTS_DELETE,
            CONTENT_PODCASTS_MODERATE,
        ],
    },
    PermissionGroup {
        area: "community",
        permissions: &[COMMUNITY_VIEW, COMMUNITY_MODERATE],
    },
    PermissionGroup {
        area: "videos",
        permissions: &[VIDEOS_VIEW, VIDEOS_EDIT],
    },
    PermissionGroup {
        area: "podcasts",
        permissions: &[PODCASTS_VIEW, PODCASTS_EDIT],
    },
    PermissionGroup {
        area: "services",
        permissions: &[
            SERVICES_VIEW,
            SERVICES_MAINTENANCE_MANAGE,
            SERVICES_ROADSIDE_MANAGE,
            SERVICES_REPAIR_MANAGE,
            SERVICES_DRIVING_SCHOOL_MANAGE,
            SERVICES_PROVIDERS_MANAGE,
        ],
    },
    PermissionGroup {
        area: "marketplace",
        permissions: &[
            MARKETPLACE_VIEW,
            MARKETPLACE_MANAGE,
            MARKETPLACE_LISTINGS_MANAGE,
            MARKETPLACE_CATEGORIES_MANAGE,
            MARKETPLACE_ORDERS_VIEW,
            MARKETPLACE_REPORTS_HANDLE,
        ],
    },
    PermissionGroup {
        area: "analytics",
        permissions: &[ANALYTICS_VIEW, REPORTS_GENERATE],
    },
    PermissionGroup {
        area: "settings",
        permissions: &[SETTINGS_VIEW, SETTINGS_EDIT, SETTINGS_MANAGE],
    },
    PermissionGroup {
        area: "cms",
        permissions: &[CMS_ABOUT_MANAGE, CMS_FAQ_MANAGE, CMS_LEGAL_MANAGE, CMS_CAREERS_MANAGE],
    },
];

/// Iterate over every enumerated permission
pub fn all() -> impl Iterator<Item = &'static Permission> {
    GROUPS.iter().flat_map(|group| group.permissions.iter())
}

static WILDCARD: Permission = ALL;

/// Look up a permission by its wire identifier
pub fn find(id: &str) -> Option<&'static Permission> {
    if id == WILDCARD.as_str() {
        return Some(&WILDCARD);
    }
    all().find(|p| p.as_str() == id)
}
