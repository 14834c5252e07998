//! Capability traits for the external commitments the processor makes.
//!
//! Federation, object storage and peer queries are pluggable; the
//! processor treats each as an opaque capability. Implementations are
//! registered by a plugin-type identifier in the server configuration
//! (see `infra::federation` and `infra::objectstore`).

use accounts_sdk::{Account, Platform};
use async_trait::async_trait;

/// Outcome of a name claim with the federation authority.
///
/// `Failed` is a caller problem (missing or invalid sublease proof,
/// name owned elsewhere) and maps to 403. `Errored` means the authority
/// itself misbehaved and maps to 500. The two must never be collapsed.
#[derive(Debug)]
pub enum ClaimResult {
    Succeeded,
    Failed(String),
    Errored(anyhow::Error),
}

/// Arbiter of globally-unique account names across the federation.
#[async_trait]
pub trait FederationDriver: Send + Sync {
    /// Register this site as owner (or, with a sublease secret, as a
    /// replica host) of the account name.
    async fn claim_account_name(
        &self,
        account: &Account,
        sublease_secret: Option<&str>,
    ) -> ClaimResult;

    /// Give the name back at the end of account deletion. Failure leaves
    /// the account undeleted; the sweeper retries.
    async fn forfeit_account_name(&self, account_name: &str) -> anyhow::Result<()>;

    /// Issue a handover secret for a primary account. An empty secret
    /// means this driver does not require handover proofs.
    async fn issue_sublease_token_secret(&self, account_name: &str) -> anyhow::Result<String>;
}

/// Per-account backing-store lifecycle hook.
///
/// Setup failure is a conflict, not a server error: it usually means the
/// backing storage is already in use by something else.
#[async_trait]
pub trait StorageDriver: Send + Sync {
    async fn can_setup_account(&self, account: &Account) -> anyhow::Result<()>;
    async fn cleanup_account(&self, account_name: &str) -> anyhow::Result<()>;
}

/// Publicly visible configuration of an account on an upstream peer, as
/// far as replica bootstrap needs it.
#[derive(Debug, Clone, Default)]
pub struct PeerAccount {
    pub platform_filter: Vec<Platform>,
}

/// Queries other registries of the same federation.
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Fetch the account config published by a peer. `None` if the peer
    /// does not host the account.
    async fn query_account(
        &self,
        peer_hostname: &str,
        account_name: &str,
    ) -> anyhow::Result<Option<PeerAccount>>;
}
