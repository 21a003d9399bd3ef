//! Permission catalog and role registry

pub mod catalog;
pub mod registry;

pub use registry::{
    content_admin_permissions, has_permission, ContentSpecialization, PermissionRegistry,
    RoleDefinition,
};
