//! Error types for the accounts module contract.

use thiserror::Error;

/// A policy failed validation.
///
/// The message names the first violated rule so callers can fix policies
/// one step at a time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct PolicyError(pub String);

impl PolicyError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A sublease token header could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubleaseTokenError {
    #[error("malformed sublease token")]
    Malformed,
}
