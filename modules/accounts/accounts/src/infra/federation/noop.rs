//! No-op federation driver for single-site deployments.
//!
//! Every claim succeeds because nobody else can contend for the name,
//! and no handover proofs are needed, so issued secrets are empty.

use accounts_sdk::Account;
use async_trait::async_trait;

use crate::domain::drivers::{ClaimResult, FederationDriver};

pub struct NoopFederationDriver;

#[async_trait]
impl FederationDriver for NoopFederationDriver {
    async fn claim_account_name(
        &self,
        _account: &Account,
        _sublease_secret: Option<&str>,
    ) -> ClaimResult {
        ClaimResult::Succeeded
    }

    async fn forfeit_account_name(&self, _account_name: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn issue_sublease_token_secret(&self, _account_name: &str) -> anyhow::Result<String> {
        Ok(String::new())
    }
}
