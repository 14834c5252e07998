//! Object-storage driver plugins.

pub mod filesystem;
pub mod in_memory;

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::drivers::StorageDriver;

pub use filesystem::FilesystemStorageDriver;
pub use in_memory::InMemoryStorageDriver;

/// Driver selection, as it appears in the server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "driver", rename_all = "kebab-case", deny_unknown_fields)]
pub enum StorageConfig {
    InMemory,
    Filesystem { root: PathBuf },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::InMemory
    }
}

#[must_use]
pub fn driver_from_config(config: &StorageConfig) -> Arc<dyn StorageDriver> {
    match config {
        StorageConfig::InMemory => Arc::new(InMemoryStorageDriver::default()),
        StorageConfig::Filesystem { root } => {
            Arc::new(FilesystemStorageDriver::new(root.clone()))
        }
    }
}
