//! Durable storage contract of the account core.
//!
//! The repository owns all reads and transactional writes of account
//! rows and the child entities the deletion path needs to inspect.
//! Policy blobs pass through as JSON text; the store never interprets
//! them.

use accounts_sdk::Account;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::ManifestLocator;

/// An account-row deletion held open inside a transaction.
///
/// The final stage of account deletion must only become visible once the
/// storage driver and the federation authority have both let go. The
/// repository deletes the row, hands out this guard, and the caller
/// commits after the drivers succeed or rolls back after they fail.
#[async_trait]
pub trait DeletionTx: Send {
    async fn commit(self: Box<Self>) -> anyhow::Result<()>;
    async fn rollback(self: Box<Self>) -> anyhow::Result<()>;
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Not-found is not an error.
    async fn find(&self, name: &str) -> anyhow::Result<Option<Account>>;

    /// All accounts, ordered by name.
    async fn list(&self) -> anyhow::Result<Vec<Account>>;

    /// Insert or update the account row atomically.
    async fn upsert(&self, account: &Account) -> anyhow::Result<()>;

    /// Atomically set `is_deleting` and the first sweep attempt time.
    async fn mark_for_deletion(
        &self,
        name: &str,
        attempt_at: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    /// Accounts with `is_deleting` whose next attempt is due.
    async fn list_deleting_due(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Account>>;

    async fn set_next_deletion_attempt(
        &self,
        name: &str,
        attempt_at: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    /// Number of manifests across all repositories of the account.
    async fn manifest_count(&self, account_name: &str) -> anyhow::Result<u64>;

    /// Manifests not referenced as a child by any other manifest, ordered
    /// by repository then digest, at most `limit` entries.
    async fn top_level_manifests(
        &self,
        account_name: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<ManifestLocator>>;

    /// Delete one manifest plus its reference edges and tags. Returns
    /// whether a row was deleted.
    async fn delete_manifest(
        &self,
        account_name: &str,
        repository: &str,
        digest: &str,
    ) -> anyhow::Result<bool>;

    /// Delete all repositories of the account; cascades to blob mounts.
    /// Only valid once no manifests remain.
    async fn delete_repositories(&self, account_name: &str) -> anyhow::Result<()>;

    async fn blob_count(&self, account_name: &str) -> anyhow::Result<u64>;

    /// Mark every blob of the account deletion-eligible and schedule the
    /// next blob sweep.
    async fn schedule_blob_sweep(
        &self,
        account_name: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    /// Delete the account row inside a transaction that stays open until
    /// the returned guard is committed or rolled back.
    async fn begin_delete(&self, name: &str) -> anyhow::Result<Box<dyn DeletionTx>>;
}
