//! The auth driver seam and the identity types it produces.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::permission::Permission;

/// Errors produced while resolving a caller's identity.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Credentials were presented but are not valid.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The auth tenant id is not acceptable for this deployment.
    #[error("invalid auth tenant id: {0}")]
    InvalidTenantId(String),

    /// The identity backend failed.
    #[error("auth driver failure: {0}")]
    Driver(#[from] anyhow::Error),
}

/// Role a user holds within one auth tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantRole {
    /// Read-only access to accounts and quotas.
    Viewer,
    /// Create and reconfigure accounts.
    Editor,
    /// Everything, including account deletion and quota changes.
    Admin,
}

impl TenantRole {
    #[must_use]
    pub fn allows(self, permission: Permission) -> bool {
        match permission {
            Permission::View | Permission::ViewQuota => true,
            Permission::Change => matches!(self, TenantRole::Editor | TenantRole::Admin),
            Permission::Delete | Permission::ChangeQuota => matches!(self, TenantRole::Admin),
        }
    }
}

/// Roles a user holds within one auth tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantGrant {
    pub auth_tenant_id: String,
    pub roles: BTreeSet<TenantRole>,
}

/// A resolved, authenticated caller.
#[derive(Debug, Clone)]
pub struct UserIdentity {
    pub user_name: String,
    pub grants: Vec<TenantGrant>,
}

/// Outcome of authentication: either an identity or the anonymous caller.
#[derive(Debug, Clone, Default)]
pub struct Authorization {
    user: Option<UserIdentity>,
}

impl Authorization {
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn user(identity: UserIdentity) -> Self {
        Self {
            user: Some(identity),
        }
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.user.is_none()
    }

    #[must_use]
    pub fn user_name(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.user_name.as_str())
    }

    /// Whether the caller holds `permission` within the given auth tenant.
    #[must_use]
    pub fn can(&self, permission: Permission, auth_tenant_id: &str) -> bool {
        let Some(user) = &self.user else {
            return false;
        };
        user.grants
            .iter()
            .filter(|g| g.auth_tenant_id == auth_tenant_id)
            .any(|g| g.roles.iter().any(|r| r.allows(permission)))
    }

    /// Auth tenants in which the caller holds `permission`. Used by list
    /// endpoints to filter the response to in-scope entries.
    #[must_use]
    pub fn tenants_with(&self, permission: Permission) -> BTreeSet<&str> {
        let Some(user) = &self.user else {
            return BTreeSet::new();
        };
        user.grants
            .iter()
            .filter(|g| g.roles.iter().any(|r| r.allows(permission)))
            .map(|g| g.auth_tenant_id.as_str())
            .collect()
    }
}

/// Pluggable identity backend.
///
/// Implementations are selected by a plugin-type identifier in the server
/// configuration; the core treats the driver as an opaque capability.
#[async_trait]
pub trait AuthDriver: Send + Sync {
    /// Check that an auth tenant id is well-formed for this deployment.
    fn validate_tenant_id(&self, auth_tenant_id: &str) -> Result<(), AuthError>;

    /// Resolve a bearer token into an authorization. `None` means no
    /// credentials were presented and yields the anonymous authorization.
    async fn authenticate(&self, bearer_token: Option<&str>) -> Result<Authorization, AuthError>;
}
