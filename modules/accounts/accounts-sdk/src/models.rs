//! Public models for the accounts module.
//!
//! These are transport-agnostic data structures that define the contract
//! between the accounts module and its consumers.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::policies::{GcPolicy, RbacPolicy, SecurityScanPolicy, TagPolicy};

/// A tenant-scoped registry namespace.
///
/// An account owns repositories, blobs, manifests and tags, plus the
/// policies that govern access control, garbage collection, tag
/// protection and vulnerability scanning within the namespace.
#[derive(Debug, Clone, Default)]
pub struct Account {
    pub name: String,
    pub auth_tenant_id: String,
    /// `None` for a primary account; `Some` for a replica.
    pub replication: Option<ReplicationPolicy>,
    /// Allow-list of platforms kept during replication. Empty means no
    /// filtering. Only replicas may carry a filter.
    pub platform_filter: Vec<Platform>,
    pub rbac_policies: Vec<RbacPolicy>,
    pub gc_policies: Vec<GcPolicy>,
    pub tag_policies: Vec<TagPolicy>,
    pub security_scan_policies: Vec<SecurityScanPolicy>,
    /// Manifest labels that pushed images must carry.
    pub required_labels: Vec<String>,
    /// Configuration is owned by an external control plane; manual edits
    /// are rejected.
    pub is_managed: bool,
    /// Terminal state: the deletion sweeper is draining this account.
    pub is_deleting: bool,
    pub next_deletion_attempt_at: Option<DateTime<Utc>>,
    pub next_blob_sweep_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Whether this account mirrors content from elsewhere (peer or
    /// external replica).
    #[must_use]
    pub fn is_replica(&self) -> bool {
        self.replication.is_some()
    }

    /// Hostname of the upstream peer, if this is a peer replica.
    #[must_use]
    pub fn upstream_peer_hostname(&self) -> Option<&str> {
        match &self.replication {
            Some(ReplicationPolicy::OnFirstUse { upstream }) => Some(upstream),
            _ => None,
        }
    }

    /// Whether this account replicates from an upstream outside the
    /// federation.
    #[must_use]
    pub fn is_external_replica(&self) -> bool {
        matches!(
            self.replication,
            Some(ReplicationPolicy::FromExternalOnFirstUse { .. })
        )
    }
}

/// How an account obtains its content.
///
/// The strategy is chosen at account creation and is immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy")]
pub enum ReplicationPolicy {
    /// Pull-through replica of another registry in the same federation.
    #[serde(rename = "on_first_use")]
    OnFirstUse { upstream: String },
    /// Pull-through replica of an arbitrary upstream registry.
    #[serde(rename = "from_external_on_first_use")]
    FromExternalOnFirstUse { upstream: ExternalPeer },
}

/// Upstream coordinates of an external replica.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalPeer {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Never serialized back to callers; shielded from debug output.
    #[serde(default, skip_serializing)]
    pub password: Option<SecretString>,
}

impl PartialEq for ExternalPeer {
    fn eq(&self, other: &Self) -> bool {
        // Credentials are deliberately excluded: two specs pointing at the
        // same upstream describe the same replication relationship.
        self.url == other.url && self.username == other.username
    }
}

impl ExternalPeer {
    #[must_use]
    pub fn password_str(&self) -> Option<&str> {
        self.password.as_ref().map(ExposeSecret::expose_secret)
    }
}

/// One OS/architecture pair a platform filter admits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub os: String,
    pub architecture: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

/// Order-insensitive equality for platform filters.
///
/// A replica created against a primary must carry the primary's filter,
/// but callers are free to list the entries in any order.
#[must_use]
pub fn platform_filters_match(a: &[Platform], b: &[Platform]) -> bool {
    a.len() == b.len() && a.iter().all(|p| b.contains(p)) && b.iter().all(|p| a.contains(p))
}
