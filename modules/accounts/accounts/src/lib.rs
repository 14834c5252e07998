//! Accounts module implementation.
//!
//! The public contract is defined in `registry-accounts-sdk` and
//! re-exported here. This crate contains the account processor, the
//! policy validator, the HTTP surface, the storage layer, the federation
//! and object-storage driver plugins, and the deletion sweeper.

pub use accounts_sdk::{Account, PolicyError, ReplicationPolicy, SubleaseToken};

pub mod api;
pub mod config;
pub mod domain;
pub mod infra;
pub mod tasks;

#[cfg(test)]
pub(crate) mod testutils;
