//! Error taxonomy of the account core.
//!
//! Five kinds, each with a distinct HTTP outcome. The REST layer maps
//! them in `api::rest::error`; nothing below this module knows about
//! status codes.

use accounts_sdk::{PolicyError, SubleaseTokenError};
use serde::Serialize;
use thiserror::Error;

/// Where a manifest lives, as reported in deletion progress payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestLocator {
    pub repository: String,
    pub digest: String,
}

/// Why a synchronous account deletion cannot complete yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionProgress {
    /// Manifests remain. `next` lists top-level manifests only, so the
    /// client can delete image lists before their children.
    RemainingManifests {
        count: u64,
        next: Vec<ManifestLocator>,
    },
    /// All manifests are gone but blobs or blob mounts persist. A blob
    /// sweep has been scheduled.
    RemainingBlobs { count: u64 },
    /// This deployment requires the account to be staged for deletion
    /// before the drain may run.
    MaintenanceRequired,
}

/// Errors surfaced by the account processor.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Malformed policy, label, regex, CIDR, or missing attribute.
    #[error("{0}")]
    Validation(String),

    /// Immutability violation, storage-setup refusal, or pending children.
    #[error("{0}")]
    Conflict(String),

    /// Deletion is ongoing; carries the progress payload.
    #[error("account deletion is still in progress")]
    DeletionBlocked(DeletionProgress),

    /// The caller is authenticated but not allowed to do this.
    #[error("{0}")]
    Forbidden(String),

    /// Malformed request content outside the JSON body itself.
    #[error("{0}")]
    BadRequest(String),

    /// A sublease token header could not be decoded.
    #[error("malformed sublease token")]
    MalformedToken,

    /// Store, federation-authority, or driver failure. Logged with
    /// detail; callers see a generic message.
    #[error("internal server error")]
    Internal(#[source] anyhow::Error),
}

impl From<PolicyError> for DomainError {
    fn from(err: PolicyError) -> Self {
        DomainError::Validation(err.0)
    }
}

impl From<SubleaseTokenError> for DomainError {
    fn from(_: SubleaseTokenError) -> Self {
        DomainError::MalformedToken
    }
}

impl From<anyhow::Error> for DomainError {
    fn from(err: anyhow::Error) -> Self {
        DomainError::Internal(err)
    }
}
