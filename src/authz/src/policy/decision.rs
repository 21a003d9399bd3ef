//! Authorization outcomes

use crate::error::{AuthzError, Result};
use crate::types::{Permission, Role};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a policy denied a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DenialReason {
    /// No principal attached to the request
    Unauthenticated,

    /// Principal's role is not among the allowed roles
    MissingRole { role: Role, allowed: Vec<Role> },

    /// Effective permission set lacks the required permission
    MissingPermission { permission: Permission },

    /// Policy name is not registered
    UnknownPolicy { name: String },
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::Unauthenticated => write!(f, "authentication required"),
            DenialReason::MissingRole { role, allowed } => {
                let allowed: Vec<&str> = allowed.iter().map(Role::as_str).collect();
                write!(f, "role {} is not one of [{}]", role, allowed.join(", "))
            }
            DenialReason::MissingPermission { permission } => {
                write!(f, "missing permission {}", permission)
            }
            DenialReason::UnknownPolicy { name } => write!(f, "unknown policy {}", name),
        }
    }
}

/// Result of evaluating a policy or requirement.
///
/// Denials are final; nothing downstream may upgrade them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum AuthorizationOutcome {
    Succeed,
    Denied { reason: DenialReason },
}

impl AuthorizationOutcome {
    pub fn denied(reason: DenialReason) -> Self {
        AuthorizationOutcome::Denied { reason }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, AuthorizationOutcome::Succeed)
    }

    /// Map a denial to the error surfaced to callers
    pub fn into_result(self) -> Result<()> {
        match self {
            AuthorizationOutcome::Succeed => Ok(()),
            AuthorizationOutcome::Denied {
                reason: DenialReason::Unauthenticated,
            } => Err(AuthzError::Unauthenticated),
            AuthorizationOutcome::Denied { reason } => Err(AuthzError::Forbidden(reason.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthenticated_maps_to_401() {
        let err = AuthorizationOutcome::denied(DenialReason::Unauthenticated)
            .into_result()
            .unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn test_other_denials_map_to_403() {
        let outcome = AuthorizationOutcome::denied(DenialReason::MissingPermission {
            permission: Permission::from_static("admin.users.edit"),
        });
        let err = outcome.into_result().unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert!(err.to_string().contains("admin.users.edit"));

        let unknown = AuthorizationOutcome::denied(DenialReason::UnknownPolicy {
            name: "Nope".into(),
        });
        assert_eq!(unknown.into_result().unwrap_err().status_code(), 403);
    }

    #[test]
    fn test_serialization_shape() {
        let json = serde_json::to_value(AuthorizationOutcome::Succeed).unwrap();
        assert_eq!(json["outcome"], "succeed");
    }
}
