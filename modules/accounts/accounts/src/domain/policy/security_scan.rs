//! Security-scan policy rules.

use accounts_sdk::{PolicyError, SecurityScanPolicy, VulnerabilitySeverity};

use super::compile_regex;

/// Assessments are shown in scan reports; keep them short.
const MAX_ASSESSMENT_BYTES: usize = 1024;

pub fn validate_security_scan_policies(
    policies: &mut [SecurityScanPolicy],
) -> Result<(), PolicyError> {
    for policy in policies.iter() {
        validate_security_scan_policy(policy)?;
    }
    Ok(())
}

fn validate_security_scan_policy(policy: &SecurityScanPolicy) -> Result<(), PolicyError> {
    if policy.match_repository.is_empty() {
        return Err(PolicyError::new(
            "security scan policy must have \"match_repository\"",
        ));
    }
    compile_regex("match_repository", &policy.match_repository)?;
    if policy.match_vulnerability_id.is_empty() {
        return Err(PolicyError::new(
            "security scan policy must have \"match_vulnerability_id\"",
        ));
    }
    compile_regex("match_vulnerability_id", &policy.match_vulnerability_id)?;

    let action = &policy.action;
    if action.assessment.is_empty() {
        return Err(PolicyError::new(
            "security scan policy must have \"action.assessment\"",
        ));
    }
    if action.assessment.len() > MAX_ASSESSMENT_BYTES {
        return Err(PolicyError::new(format!(
            "\"action.assessment\" must not be larger than {MAX_ASSESSMENT_BYTES} bytes",
        )));
    }

    match (&action.severity, action.ignore) {
        (Some(_), true) | (None, false) => {
            return Err(PolicyError::new(
                "security scan policy action must set exactly one of \"severity\" or \"ignore\"",
            ));
        }
        _ => {}
    }
    if let Some(severity) = action.severity {
        // Pending and Unknown are scanner states, never valid overrides.
        if matches!(
            severity,
            VulnerabilitySeverity::Pending | VulnerabilitySeverity::Unknown
        ) {
            return Err(PolicyError::new(
                "security scan policy cannot set severity \"Pending\" or \"Unknown\"",
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
        validate_security_scan_policies(&mut policies)
    }

    #[test]
    fn severity_override_is_valid() {
        assert!(check(serde_json::json!({
            "match_repository": ".*",
            "match_vulnerability_id": "CVE-2024-.*",
            "action": {"assessment": "not reachable in our images", "severity": "Low"},
        }))
        .is_ok());
    }

    #[test]
    fn ignore_is_valid() {
        assert!(check(serde_json::json!({
            "match_repository": ".*",
            "match_vulnerability_id": "CVE-2024-0001",
            "except_fix_released": true,
            "action": {"assessment": "risk accepted", "ignore": true},
        }))
        .is_ok());
    }

    #[test]
    fn action_must_set_exactly_one() {
        let err = check(serde_json::json!({
            "match_repository": ".*",
            "match_vulnerability_id": ".*",
            "action": {"assessment": "x"},
        }))
        .unwrap_err();
        assert!(err.0.contains("exactly one"));

        let err = check(serde_json::json!({
            "match_repository": ".*",
            "match_vulnerability_id": ".*",
            "action": {"assessment": "x", "ignore": true, "severity": "Low"},
        }))
        .unwrap_err();
        assert!(err.0.contains("exactly one"));
    }

    #[test]
    fn scanner_states_are_not_valid_severities() {
        for severity in ["Pending", "Unknown"] {
            let err = check(serde_json::json!({
                "match_repository": ".*",
                "match_vulnerability_id": ".*",
                "action": {"assessment": "x", "severity": severity},
            }))
            .unwrap_err();
            assert!(err.0.contains(severity));
        }
    }

    #[test]
    fn assessment_is_mandatory_and_bounded() {
        let err = check(serde_json::json!({
            "match_repository": ".*",
            "match_vulnerability_id": ".*",
            "action": {"assessment": "", "ignore": true},
        }))
        .unwrap_err();
        assert!(err.0.contains("assessment"));

        let err = check(serde_json::json!({
            "match_repository": ".*",
            "match_vulnerability_id": ".*",
            "action": {"assessment": "x".repeat(1025), "ignore": true},
        }))
        .unwrap_err();
        assert!(err.0.contains("1024"));
    }
}
