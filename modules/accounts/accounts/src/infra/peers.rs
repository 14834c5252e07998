//! HTTP client for querying peer registries of the same federation.
//!
//! Used during replica bootstrap to inherit the primary's platform
//! filter.

use accounts_sdk::Platform;
use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::drivers::{PeerAccount, PeerClient};

pub struct RestPeerClient {
    client: reqwest::Client,
    /// Bearer token presented to peers, if inter-registry traffic is
    /// authenticated in this deployment.
    token: Option<String>,
}

#[derive(Deserialize)]
struct PeerAccountEnvelope {
    account: PeerAccountBody,
}

#[derive(Deserialize)]
struct PeerAccountBody {
    #[serde(default)]
    platform_filter: Vec<Platform>,
}

impl RestPeerClient {
    #[must_use]
    pub fn new(token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
        }
    }
}

#[async_trait]
impl PeerClient for RestPeerClient {
    async fn query_account(
        &self,
        peer_hostname: &str,
        account_name: &str,
    ) -> anyhow::Result<Option<PeerAccount>> {
        let url = format!("https://{peer_hostname}/keppel/v1/accounts/{account_name}");
        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        let body: PeerAccountEnvelope = response.json().await?;
        Ok(Some(PeerAccount {
            platform_filter: body.account.platform_filter,
        }))
    }
}
