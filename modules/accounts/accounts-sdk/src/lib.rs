//! Public contract of the accounts module.
//!
//! Transport-agnostic models for registry accounts and their policies,
//! the sublease token codec used for account handover between peer
//! registries, and the error types surfaced to consumers.

pub mod error;
pub mod models;
pub mod policies;
pub mod sublease;

pub use error::{PolicyError, SubleaseTokenError};
pub use models::{platform_filters_match, Account, ExternalPeer, Platform, ReplicationPolicy};
pub use policies::{
    GcAction, GcPolicy, GcTimeConstraint, GcTimeField, RbacPermission, RbacPolicy,
    SecurityScanAction, SecurityScanPolicy, TagPolicy, TimeSpan, TimeUnit, VulnerabilitySeverity,
};
pub use sublease::SubleaseToken;
