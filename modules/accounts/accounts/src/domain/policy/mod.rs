//! Policy validation and normalization.
//!
//! One pure function per policy kind. Each returns the first violated
//! rule as a [`PolicyError`]; none of them performs I/O. Normalization
//! (CIDR canonicalization) happens in place so the persisted form is the
//! canonical one and `GET` reflects it.

mod gc;
mod rbac;
mod security_scan;
mod tag;
mod validation;

pub use gc::validate_gc_policies;
pub use rbac::validate_rbac_policies;
pub use security_scan::validate_security_scan_policies;
pub use tag::validate_tag_policies;
pub use validation::validate_required_labels;

use accounts_sdk::PolicyError;
use ipnet::IpNet;

/// Compile a user-supplied regex field eagerly.
///
/// Compilation failure is a policy error, not a server error: the regex
/// came from the request body.
pub(crate) fn compile_regex(field: &str, pattern: &str) -> Result<(), PolicyError> {
    regex::Regex::new(pattern)
        .map(|_| ())
        .map_err(|err| PolicyError::new(format!("{field:?} is not a valid regex: {err}")))
}

/// Parse and canonicalize a CIDR to its network address.
///
/// Match-everything ranges are rejected: a policy that applies to every
/// source address is meaningless at best and dangerous at worst.
pub(crate) fn normalize_cidr(input: &str) -> Result<String, PolicyError> {
    let net: IpNet = input
        .parse()
        .map_err(|_| PolicyError::new(format!("{input:?} is not a valid CIDR")))?;
    if net.prefix_len() == 0 {
        return Err(PolicyError::new(format!(
            "CIDR {input:?} matches everything and is not allowed"
        )));
    }
    Ok(net.trunc().to_string())
}
