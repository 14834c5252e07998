//! RBAC policy rules.

use accounts_sdk::{PolicyError, RbacPermission, RbacPolicy};

use super::{compile_regex, normalize_cidr};

/// Validate and normalize a set of RBAC policies.
///
/// `is_external_replica` gates `anonymous_first_pull`, which only makes
/// sense where a first pull triggers replication from an upstream outside
/// the federation.
pub fn validate_rbac_policies(
    policies: &mut [RbacPolicy],
    is_external_replica: bool,
) -> Result<(), PolicyError> {
    for policy in policies {
        validate_rbac_policy(policy, is_external_replica)?;
    }
    Ok(())
}

fn validate_rbac_policy(
    policy: &mut RbacPolicy,
    is_external_replica: bool,
) -> Result<(), PolicyError> {
    let has = |perm: RbacPermission| {
        policy.permissions.contains(&perm) || policy.forbidden_permissions.contains(&perm)
    };

    if policy.permissions.is_empty() && policy.forbidden_permissions.is_empty() {
        return Err(PolicyError::new(
            "RBAC policy must grant at least one permission",
        ));
    }
    if policy.match_repository.is_none()
        && policy.match_username.is_none()
        && policy.match_cidr.is_none()
    {
        return Err(PolicyError::new(
            "RBAC policy must have at least one match attribute",
        ));
    }

    for perm in &policy.permissions {
        if policy.forbidden_permissions.contains(perm) {
            return Err(PolicyError::new(format!(
                "RBAC policy cannot have the same permission in both \"permissions\" and \"forbidden_permissions\": {}",
                permission_name(*perm),
            )));
        }
    }

    if has(RbacPermission::AnonymousPull) || has(RbacPermission::AnonymousFirstPull) {
        if policy.match_username.is_some() {
            return Err(PolicyError::new(
                "RBAC policy with anonymous access cannot have \"match_username\"",
            ));
        }
    }
    if has(RbacPermission::AnonymousFirstPull) && !is_external_replica {
        return Err(PolicyError::new(
            "\"anonymous_first_pull\" is only allowed for external replica accounts",
        ));
    }
    if has(RbacPermission::Pull) && policy.match_cidr.is_none() && policy.match_username.is_none()
    {
        return Err(PolicyError::new(
            "RBAC policy with \"pull\" must have \"match_cidr\" or \"match_username\"",
        ));
    }
    if has(RbacPermission::Delete) && policy.match_username.is_none() {
        return Err(PolicyError::new(
            "RBAC policy with \"delete\" must have \"match_username\"",
        ));
    }
    if has(RbacPermission::Push) && !has(RbacPermission::Pull) {
        return Err(PolicyError::new(
            "RBAC policy with \"push\" must also have \"pull\"",
        ));
    }

    if let Some(pattern) = &policy.match_repository {
        compile_regex("match_repository", pattern)?;
    }
    if let Some(pattern) = &policy.match_username {
        compile_regex("match_username", pattern)?;
    }
    if let Some(cidr) = &policy.match_cidr {
        policy.match_cidr = Some(normalize_cidr(cidr)?);
    }

    Ok(())
}

fn permission_name(perm: RbacPermission) -> &'static str {
    match perm {
        RbacPermission::AnonymousPull => "anonymous_pull",
        RbacPermission::AnonymousFirstPull => "anonymous_first_pull",
        RbacPermission::Pull => "pull",
        RbacPermission::Push => "push",
        RbacPermission::Delete => "delete",
    }
}
