//! Static auth driver: bearer tokens declared in configuration.
//!
//! Serves tests and small single-operator deployments. Production
//! deployments plug in an identity-provider-backed driver instead.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::driver::{AuthDriver, AuthError, Authorization, TenantGrant, UserIdentity};

/// One configured user with a fixed bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticUser {
    pub token: String,
    pub user_name: String,
    pub grants: Vec<TenantGrant>,
}

/// Auth driver backed by a fixed token table.
pub struct StaticAuthDriver {
    by_token: HashMap<String, UserIdentity>,
}

impl StaticAuthDriver {
    #[must_use]
    pub fn new(users: Vec<StaticUser>) -> Self {
        let by_token = users
            .into_iter()
            .map(|u| {
                (
                    u.token,
                    UserIdentity {
                        user_name: u.user_name,
                        grants: u.grants,
                    },
                )
            })
            .collect();
        Self { by_token }
    }
}

#[async_trait]
impl AuthDriver for StaticAuthDriver {
    fn validate_tenant_id(&self, auth_tenant_id: &str) -> Result<(), AuthError> {
        if auth_tenant_id.is_empty() {
            return Err(AuthError::InvalidTenantId(
                "auth tenant id must not be empty".to_owned(),
            ));
        }
        Ok(())
    }

    async fn authenticate(&self, bearer_token: Option<&str>) -> Result<Authorization, AuthError> {
        match bearer_token {
            None => Ok(Authorization::anonymous()),
            Some(token) => self
                .by_token
                .get(token)
                .map(|identity| Authorization::user(identity.clone()))
                .ok_or(AuthError::InvalidCredentials),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        let driver = StaticAuthDriver::new(vec![]);
        let result = driver.authenticate(Some("nope")).await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn grants_deserialize_from_config_shape() {
        let users: Vec<StaticUser> = serde_json::from_str(
            r#"[{
                "token": "t",
                "user_name": "exampleuser",
                "grants": [{"auth_tenant_id": "tenant1", "roles": ["viewer", "admin"]}]
            }]"#,
        )
        .unwrap();
        let driver = StaticAuthDriver::new(users);
        let authz = driver.authenticate(Some("t")).await.unwrap();
        assert!(authz.can(crate::Permission::Delete, "tenant1"));
        assert!(authz
            .tenants_with(crate::Permission::View)
            .contains("tenant1"));
    }
}
