//! The deletion sweeper: drains accounts staged for deletion.
//!
//! Each pass walks every due `is_deleting` account through the drain
//! sequence: top-level manifests in bounded batches, then repositories,
//! then the blob sweep, then federation forfeit, storage cleanup and
//! finally the account row itself. Work is bounded per account per pass
//! so one big account does not starve the others; progress beyond the
//! bound rides on rescheduling.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use accounts_sdk::Account;

use crate::config::DeletionConfig;
use crate::domain::drivers::{FederationDriver, StorageDriver};
use crate::domain::repo::AccountRepository;

pub struct DeletionSweeper<R> {
    repo: Arc<R>,
    federation: Arc<dyn FederationDriver>,
    storage: Arc<dyn StorageDriver>,
    config: DeletionConfig,
}

/// What a single pass over one account achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SweepOutcome {
    /// The account row is gone.
    Finished,
    /// Some work was done or is still pending; come back later.
    Rescheduled,
}

impl<R: AccountRepository> DeletionSweeper<R> {
    pub fn new(
        repo: Arc<R>,
        federation: Arc<dyn FederationDriver>,
        storage: Arc<dyn StorageDriver>,
        config: DeletionConfig,
    ) -> Self {
        Self {
            repo,
            federation,
            storage,
            config,
        }
    }

    /// Run until cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        let interval = Duration::from_secs(self.config.sweep_interval_secs);
        info!(interval_secs = self.config.sweep_interval_secs, "deletion sweeper started");
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("deletion sweeper stopping");
                    return;
                }
                () = tokio::time::sleep(interval) => {}
            }
            if let Err(err) = self.sweep_once().await {
                warn!(error = ?err, "deletion sweep pass failed");
            }
        }
    }

    /// One pass over all due accounts. Returns how many accounts were
    /// fully deleted.
    pub async fn sweep_once(&self) -> anyhow::Result<usize> {
        let due = self.repo.list_deleting_due(Utc::now()).await?;
        let mut finished = 0;
        for account in due {
            match self.sweep_account(&account).await {
                Ok(SweepOutcome::Finished) => finished += 1,
                Ok(SweepOutcome::Rescheduled) => {}
                Err(err) => {
                    warn!(account = %account.name, error = ?err, "failed to sweep account");
                    self.reschedule(&account.name).await;
                }
            }
        }
        Ok(finished)
    }

    #[instrument(skip_all, fields(account = %account.name))]
    async fn sweep_account(&self, account: &Account) -> anyhow::Result<SweepOutcome> {
        let name = account.name.as_str();

        let manifest_count = self.repo.manifest_count(name).await?;
        if manifest_count > 0 {
            // Top-level first: an image list must go before its members,
            // and deleting it surfaces the members in the next pass.
            let batch_size = usize::try_from(self.config.manifest_batch_size).unwrap_or(10);
            let batch = self.repo.top_level_manifests(name, batch_size).await?;
            for manifest in &batch {
                self.repo
                    .delete_manifest(name, &manifest.repository, &manifest.digest)
                    .await?;
            }
            debug!(
                deleted = batch.len(),
                remaining = manifest_count,
                "deleted a batch of manifests",
            );
            self.repo
                .set_next_deletion_attempt(name, Utc::now())
                .await?;
            return Ok(SweepOutcome::Rescheduled);
        }

        self.repo.delete_repositories(name).await?;

        let blob_count = self.repo.blob_count(name).await?;
        if blob_count > 0 {
            // The blob sweeper owns actual blob removal; here we only
            // mark everything eligible and get it moving immediately.
            self.repo.schedule_blob_sweep(name, Utc::now()).await?;
            self.reschedule(name).await;
            return Ok(SweepOutcome::Rescheduled);
        }

        let tx = self.repo.begin_delete(name).await?;
        if let Err(err) = self.federation.forfeit_account_name(name).await {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(account = %name, error = %rollback_err, "rollback failed");
            }
            return Err(err.context("failed to forfeit account name"));
        }
        if let Err(err) = self.storage.cleanup_account(name).await {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(account = %name, error = %rollback_err, "rollback failed");
            }
            return Err(err.context("failed to clean up backing storage"));
        }
        tx.commit().await?;

        info!(account = %name, "account fully deleted");
        Ok(SweepOutcome::Finished)
    }

    async fn reschedule(&self, name: &str) {
        let at = Utc::now() + chrono::Duration::seconds(self.config.retry_backoff_secs);
        if let Err(err) = self.repo.set_next_deletion_attempt(name, at).await {
            warn!(account = %name, error = ?err, "failed to reschedule deletion attempt");
        }
    }
}
