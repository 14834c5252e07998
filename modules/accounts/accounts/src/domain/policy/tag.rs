//! Tag policy rules.

use accounts_sdk::{PolicyError, TagPolicy};

use super::compile_regex;

pub fn validate_tag_policies(policies: &mut [TagPolicy]) -> Result<(), PolicyError> {
    for policy in policies.iter() {
        if policy.match_repository.is_empty() {
            return Err(PolicyError::new(
                "tag policy must have \"match_repository\"",
            ));
        }
        compile_regex("match_repository", &policy.match_repository)?;
        if let Some(pattern) = &policy.match_tag {
            compile_regex("match_tag", pattern)?;
        }
        if !policy.block_overwrite && !policy.block_delete {
            return Err(PolicyError::new(
                "tag policy must block at least one of \"overwrite\" or \"delete\"",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(json: serde_json::Value) -> Result<(), PolicyError> {
        let mut policies = vec![serde_json::from_value(json).unwrap()];
        validate_tag_policies(&mut policies)
    }

    #[test]
    fn blocking_policy_is_valid() {
        assert!(check(serde_json::json!({
            "match_repository": "library/.*",
            "match_tag": "v[0-9]+.*",
            "block_overwrite": true,
        }))
        .is_ok());
    }

    #[test]
    fn policy_must_block_something() {
        let err = check(serde_json::json!({
            "match_repository": ".*",
        }))
        .unwrap_err();
        assert!(err.0.contains("at least one"));
    }

    #[test]
    fn match_repository_is_mandatory() {
        let err = check(serde_json::json!({
            "match_repository": "",
            "block_delete": true,
        }))
        .unwrap_err();
        assert!(err.0.contains("match_repository"));
    }
}
