//! Storage driver backed by a local directory tree.
//!
//! Each account gets a directory under the configured root. Setup and
//! cleanup are idempotent by contract.

use std::path::PathBuf;

use accounts_sdk::Account;
use async_trait::async_trait;

use crate::domain::drivers::StorageDriver;

pub struct FilesystemStorageDriver {
    root: PathBuf,
}

impl FilesystemStorageDriver {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn account_dir(&self, account_name: &str) -> PathBuf {
        self.root.join(account_name)
    }
}

#[async_trait]
impl StorageDriver for FilesystemStorageDriver {
    async fn can_setup_account(&self, account: &Account) -> anyhow::Result<()> {
        let dir = self.account_dir(&account.name);
        if tokio::fs::metadata(&dir).await.is_ok_and(|m| !m.is_dir()) {
            anyhow::bail!("storage path {} is already occupied", dir.display());
        }
        tokio::fs::create_dir_all(&dir).await?;
        Ok(())
    }

    async fn cleanup_account(&self, account_name: &str) -> anyhow::Result<()> {
        let dir = self.account_dir(account_name);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
