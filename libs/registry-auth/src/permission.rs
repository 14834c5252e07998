//! Permissions checked against account and tenant scopes.

use serde::{Deserialize, Serialize};

/// An action a caller may be allowed to perform within a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Read account configuration and inventory.
    View,
    /// Create accounts and change account configuration.
    Change,
    /// Delete accounts and their contents.
    Delete,
    /// Read quota configuration.
    ViewQuota,
    /// Change quota configuration.
    ChangeQuota,
}

impl Permission {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::View => "view",
            Permission::Change => "change",
            Permission::Delete => "delete",
            Permission::ViewQuota => "viewquota",
            Permission::ChangeQuota => "changequota",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
