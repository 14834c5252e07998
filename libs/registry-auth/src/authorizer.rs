//! The scope authorizer gating every core operation.

use std::sync::Arc;

use crate::driver::{AuthDriver, AuthError, Authorization};
use crate::permission::Permission;
use crate::scope::Scope;

/// Resolves callers to authorizations and renders bearer challenges.
#[derive(Clone)]
pub struct ScopeAuthorizer {
    driver: Arc<dyn AuthDriver>,
    /// Public URL of the token endpoint advertised in challenges.
    auth_realm: String,
    /// Service name advertised in challenges (this registry's hostname).
    service: String,
}

impl ScopeAuthorizer {
    #[must_use]
    pub fn new(driver: Arc<dyn AuthDriver>, auth_realm: String, service: String) -> Self {
        Self {
            driver,
            auth_realm,
            service,
        }
    }

    #[must_use]
    pub fn driver(&self) -> &Arc<dyn AuthDriver> {
        &self.driver
    }

    /// Resolve the caller's bearer token (if any) into an authorization.
    pub async fn authenticate(
        &self,
        bearer_token: Option<&str>,
    ) -> Result<Authorization, AuthError> {
        match bearer_token {
            None => Ok(Authorization::anonymous()),
            Some(token) => self.driver.authenticate(Some(token)).await,
        }
    }

    /// `WWW-Authenticate` value telling the client where to obtain a token
    /// for the given scope.
    #[must_use]
    pub fn bearer_challenge(&self, permission: Permission, scope: &Scope) -> String {
        format!(
            r#"Bearer realm="{}",service="{}",scope="{}:{}""#,
            self.auth_realm, self.service, scope, permission
        )
    }
}
