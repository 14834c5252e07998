//! Federation driver speaking JSON over HTTP to an external authority.

use accounts_sdk::Account;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::drivers::{ClaimResult, FederationDriver};

pub struct RestFederationDriver {
    base_url: Url,
    token: Option<String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ClaimRequest<'a> {
    auth_tenant_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sublease_secret: Option<&'a str>,
}

#[derive(Deserialize)]
struct SubleaseSecretResponse {
    secret: String,
}

impl RestFederationDriver {
    #[must_use]
    pub fn new(base_url: Url, token: Option<String>) -> Self {
        Self {
            base_url,
            token,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, account_name: &str, suffix: &str) -> anyhow::Result<Url> {
        let path = format!("v1/names/{account_name}{suffix}");
        self.base_url
            .join(&path)
            .map_err(|err| anyhow::anyhow!("invalid federation endpoint {path:?}: {err}"))
    }

    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl FederationDriver for RestFederationDriver {
    async fn claim_account_name(
        &self,
        account: &Account,
        sublease_secret: Option<&str>,
    ) -> ClaimResult {
        let url = match self.endpoint(&account.name, "") {
            Ok(url) => url,
            Err(err) => return ClaimResult::Errored(err),
        };
        let body = ClaimRequest {
            auth_tenant_id: &account.auth_tenant_id,
            sublease_secret,
        };
        let response = self.with_auth(self.client.post(url)).json(&body).send().await;
        match response {
            Ok(response) if response.status().is_success() => ClaimResult::Succeeded,
            Ok(response) if response.status().is_client_error() => {
                let reason = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "claim denied".to_owned());
                ClaimResult::Failed(reason)
            }
            Ok(response) => ClaimResult::Errored(anyhow::anyhow!(
                "federation authority answered with status {}",
                response.status(),
            )),
            Err(err) => ClaimResult::Errored(err.into()),
        }
    }

    async fn forfeit_account_name(&self, account_name: &str) -> anyhow::Result<()> {
        let url = self.endpoint(account_name, "")?;
        let response = self.with_auth(self.client.delete(url)).send().await?;
        // 404 means the authority already forgot about us; fine either way.
        if response.status().is_success() || response.status() == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            anyhow::bail!(
                "federation authority refused to release {account_name:?}: status {}",
                response.status(),
            )
        }
    }

    async fn issue_sublease_token_secret(&self, account_name: &str) -> anyhow::Result<String> {
        let url = self.endpoint(account_name, "/sublease-secret")?;
        let response = self
            .with_auth(self.client.post(url))
            .send()
            .await?
            .error_for_status()?;
        let body: SubleaseSecretResponse = response.json().await?;
        Ok(body.secret)
    }
}
