//! Configuration for the accounts module.

use serde::{Deserialize, Serialize};

/// Module configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccountsConfig {
    pub deletion: DeletionConfig,
}

/// Which account-deletion protocol this deployment speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionMode {
    /// DELETE marks the account and the sweeper drains it asynchronously.
    #[default]
    Staged,
    /// DELETE drains inline and answers 409 with a progress payload until
    /// the account is empty. Kept for deployments whose clients rely on
    /// the progress payload.
    Synchronous,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeletionConfig {
    pub mode: DeletionMode,

    /// Synchronous variant only: require the account to be staged for
    /// deletion before the drain may proceed.
    pub require_maintenance: bool,

    /// How often the sweeper looks for due accounts.
    pub sweep_interval_secs: u64,

    /// Upper bound of manifest deletions per account per pass, so one big
    /// account does not starve others.
    pub manifest_batch_size: u64,

    /// Delay before a failed pass is retried.
    pub retry_backoff_secs: i64,
}

impl Default for DeletionConfig {
    fn default() -> Self {
        Self {
            mode: DeletionMode::Staged,
            require_maintenance: false,
            sweep_interval_secs: 30,
            manifest_batch_size: 10,
            retry_backoff_secs: 60,
        }
    }
}
