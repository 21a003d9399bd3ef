//! Core authorization types

use crate::error::AuthzError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Admin role tier. Exactly one role is active per principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    SuperAdmin,
    Admin,
    UserAdmin,
    ContentAdmin,
    CommunityAdmin,
    MarketplaceAdmin,
    VideoAdmin,
    PodcastAdmin,
    ServicesAdmin,
    AnalyticsAdmin,
    SettingsAdmin,
    #[serde(rename = "CMSAdmin")]
    CmsAdmin,
    Moderator,
}

impl Role {
    /// Every role, most privileged first
    pub const ALL: [Role; 13] = [
        Role::SuperAdmin,
        Role::Admin,
        Role::UserAdmin,
        Role::ContentAdmin,
        Role::CommunityAdmin,
        Role::MarketplaceAdmin,
        Role::VideoAdmin,
        Role::PodcastAdmin,
        Role::ServicesAdmin,
        Role::AnalyticsAdmin,
        Role::SettingsAdmin,
        Role::CmsAdmin,
        Role::Moderator,
    ];

    /// Wire name of the role (matches role claims issued upstream)
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "SuperAdmin",
            Role::Admin => "Admin",
            Role::UserAdmin => "UserAdmin",
            Role::ContentAdmin => "ContentAdmin",
            Role::CommunityAdmin => "CommunityAdmin",
            Role::MarketplaceAdmin => "MarketplaceAdmin",
            Role::VideoAdmin => "VideoAdmin",
            Role::PodcastAdmin => "PodcastAdmin",
            Role::ServicesAdmin => "ServicesAdmin",
            Role::AnalyticsAdmin => "AnalyticsAdmin",
            Role::SettingsAdmin => "SettingsAdmin",
            Role::CmsAdmin => "CMSAdmin",
            Role::Moderator => "Moderator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| AuthzError::UnknownRole(s.to_string()))
    }
}

/// Opaque permission identifier (`admin.<area>.<verb>`).
///
/// Compared by exact string equality; the literal string is the wire form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    /// Permission backed by a static identifier
    pub const fn from_static(id: &'static str) -> Self {
        Self(Cow::Borrowed(id))
    }

    /// Permission from a runtime string (e.g. a claim on a token)
    pub fn new(id: impl Into<String>) -> Self {
        Self(Cow::Owned(id.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Permission {
    fn from(id: &str) -> Self {
        Permission::new(id)
    }
}

/// Authenticated caller (admin user)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    /// User identifier
    pub user_id: Uuid,

    /// User email, when the identity provider supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Active role
    pub role: Role,

    /// Explicit permission claims granted on top of the role
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl Principal {
    /// Create a new principal with the given role and no extra claims
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self {
            user_id,
            email: None,
            role,
            permissions: Vec::new(),
        }
    }

    /// Attach an email address
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Attach an explicit permission claim
    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.push(permission);
        self
    }

    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }
}
