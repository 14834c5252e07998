//! Sublease token codec.
//!
//! A sublease token is the one-shot proof a primary account issues so a
//! peer registry may claim a replica of the same name with the federation
//! authority. On the wire it is the standard-base64 encoding of a small
//! JSON document.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::SubleaseTokenError;

/// Proof of a primary's consent to host a replica of its account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubleaseToken {
    #[serde(rename = "account")]
    pub account_name: String,
    #[serde(rename = "primary")]
    pub primary_hostname: String,
    pub secret: String,
}

impl SubleaseToken {
    /// The null token: some federation drivers do not require handover
    /// proofs and issue empty secrets.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.secret.is_empty()
    }

    /// Encode for the `X-Keppel-Sublease-Token` header.
    ///
    /// A token with an empty secret encodes to the empty string, the
    /// sentinel for "no handover proof required".
    #[must_use]
    pub fn serialize(&self) -> String {
        if self.is_null() {
            return String::new();
        }
        // Serialization of this struct cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        BASE64.encode(json)
    }

    /// Decode a header value. Empty input is the valid null token.
    pub fn parse(input: &str) -> Result<SubleaseToken, SubleaseTokenError> {
        if input.is_empty() {
            return Ok(SubleaseToken::default());
        }
        let raw = BASE64
            .decode(input.trim())
            .map_err(|_| SubleaseTokenError::Malformed)?;
        serde_json::from_slice(&raw).map_err(|_| SubleaseTokenError::Malformed)
    }
}
