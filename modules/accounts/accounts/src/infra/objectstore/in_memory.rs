//! In-memory storage driver for tests and demos.

use std::collections::HashSet;

use accounts_sdk::Account;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::drivers::StorageDriver;

#[derive(Default)]
pub struct InMemoryStorageDriver {
    active: Mutex<HashSet<String>>,
    denied: Mutex<HashSet<String>>,
}

impl InMemoryStorageDriver {
    /// Make setup fail for this account name, to exercise the conflict
    /// path.
    pub fn deny_setup(&self, name: &str) {
        self.denied.lock().insert(name.to_owned());
    }

    #[must_use]
    pub fn is_active(&self, name: &str) -> bool {
        self.active.lock().contains(name)
    }
}

#[async_trait]
impl StorageDriver for InMemoryStorageDriver {
    async fn can_setup_account(&self, account: &Account) -> anyhow::Result<()> {
        if self.denied.lock().contains(&account.name) {
            anyhow::bail!(
                "backing storage for account {:?} is already in use",
                account.name,
            );
        }
        self.active.lock().insert(account.name.clone());
        Ok(())
    }

    async fn cleanup_account(&self, account_name: &str) -> anyhow::Result<()> {
        self.active.lock().remove(account_name);
        Ok(())
    }
}
