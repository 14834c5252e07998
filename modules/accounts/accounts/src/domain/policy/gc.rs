//! Garbage-collection policy rules.

use accounts_sdk::{GcAction, GcPolicy, PolicyError};

use super::compile_regex;

pub fn validate_gc_policies(policies: &mut [GcPolicy]) -> Result<(), PolicyError> {
    for policy in policies.iter_mut() {
        validate_gc_policy(policy)?;
    }
    Ok(())
}

fn validate_gc_policy(policy: &GcPolicy) -> Result<(), PolicyError> {
    if policy.match_repository.is_empty() {
        return Err(PolicyError::new(
            "GC policy must have \"match_repository\"",
        ));
    }
    compile_regex("match_repository", &policy.match_repository)?;
    if let Some(pattern) = &policy.except_repository {
        compile_regex("except_repository", pattern)?;
    }
    if let Some(pattern) = &policy.match_tag {
        compile_regex("match_tag", pattern)?;
    }
    if let Some(pattern) = &policy.except_tag {
        compile_regex("except_tag", pattern)?;
    }

    if policy.only_untagged && (policy.match_tag.is_some() || policy.except_tag.is_some()) {
        return Err(PolicyError::new(
            "GC policy cannot have \"only_untagged\" together with tag match attributes",
        ));
    }

    if let Some(constraint) = &policy.time_constraint {
        if constraint.on.is_none() {
            return Err(PolicyError::new(
                "GC policy time constraint must have \"on\"",
            ));
        }
        let selectors = [
            constraint.older_than.is_some(),
            constraint.newer_than.is_some(),
            constraint.oldest.is_some(),
            constraint.newest.is_some(),
        ];
        let count = selectors.iter().filter(|set| **set).count();
        if count != 1 {
            return Err(PolicyError::new(
                "GC policy time constraint must set exactly one of \"older_than\", \"newer_than\", \"oldest\", \"newest\"",
            ));
        }
        if policy.action == GcAction::Delete
            && (constraint.oldest.is_some() || constraint.newest.is_some())
        {
            return Err(PolicyError::new(
                "GC policy with action \"delete\" cannot use \"oldest\" or \"newest\"",
            ));
        }
    }

    Ok(())
}
