//! Policy types attached to an account.
//!
//! Policies are stored as ordered JSON sequences; order is significant for
//! GC policies (first match wins) and preserved for all other kinds.
//! Validation and normalization rules live with the accounts module; the
//! types here only define the wire and storage shape.

use serde::{Deserialize, Deserializer, Serialize};

/// Deserialize a JSON `null` as an empty list.
///
/// Callers routinely round-trip `GET` output into `PUT` input, and some
/// clients encode "no entries" as `null`.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let value: Option<Vec<T>> = Option::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

/// A permission grantable through an RBAC policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RbacPermission {
    AnonymousPull,
    AnonymousFirstPull,
    Pull,
    Push,
    Delete,
}

/// Grants (or withholds) permissions on repositories matching a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RbacPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_cidr: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub permissions: Vec<RbacPermission>,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub forbidden_permissions: Vec<RbacPermission>,
}

/// What a matching GC policy does with a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GcAction {
    /// Exempt the manifest from deletion by later policies.
    Protect,
    /// Delete the manifest.
    Delete,
}

/// Which timestamp a GC time constraint evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GcTimeField {
    PushedAt,
    LastPulledAt,
}

/// A duration with an explicit unit, as shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub value: u64,
    pub unit: TimeUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeUnit {
    #[serde(rename = "s")]
    Seconds,
    #[serde(rename = "m")]
    Minutes,
    #[serde(rename = "h")]
    Hours,
    #[serde(rename = "d")]
    Days,
    #[serde(rename = "w")]
    Weeks,
}

/// Time-based selection inside a GC policy.
///
/// Exactly one of the four selectors must be set; `on` names the
/// timestamp being compared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcTimeConstraint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<GcTimeField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub older_than: Option<TimeSpan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub newer_than: Option<TimeSpan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oldest: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub newest: Option<u64>,
}

/// Garbage-collection rule. Policies are evaluated in order; the first
/// match decides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcPolicy {
    pub match_repository: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub except_repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub except_tag: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub only_untagged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_constraint: Option<GcTimeConstraint>,
    pub action: GcAction,
}

/// Protects tags from overwrite or deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagPolicy {
    pub match_repository: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_tag: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub block_overwrite: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub block_delete: bool,
}

/// Severity of a scan finding.
///
/// `Pending` and `Unknown` describe scanner states; a policy may never
/// assign them explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VulnerabilitySeverity {
    Clean,
    Unknown,
    Pending,
    Low,
    Medium,
    High,
    Critical,
}

/// What a security-scan policy does with matching findings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityScanAction {
    /// Justification shown next to the adjusted finding. At most 1 KiB.
    pub assessment: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ignore: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<VulnerabilitySeverity>,
}

/// Overrides the reported severity of (or ignores) a vulnerability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityScanPolicy {
    pub match_repository: String,
    pub match_vulnerability_id: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub except_fix_released: bool,
    pub action: SecurityScanAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_by_user: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_permission_list_becomes_empty() {
        let policy: RbacPolicy = serde_json::from_str(
            r#"{"match_repository": "library/.*", "permissions": null}"#,
        )
        .unwrap();
        assert!(policy.permissions.is_empty());
        assert!(policy.forbidden_permissions.is_empty());
    }

    #[test]
    fn gc_policy_preserves_unset_selectors() {
        let policy: GcPolicy = serde_json::from_str(
            r#"{
                "match_repository": ".*",
                "time_constraint": {"on": "pushed_at", "older_than": {"value": 10, "unit": "d"}},
                "action": "delete"
            }"#,
        )
        .unwrap();
        let constraint = policy.time_constraint.as_ref().unwrap();
        assert_eq!(constraint.on, Some(GcTimeField::PushedAt));
        assert_eq!(
            constraint.older_than,
            Some(TimeSpan {
                value: 10,
                unit: TimeUnit::Days
            })
        );
        assert!(constraint.oldest.is_none());

        let json = serde_json::to_value(&policy).unwrap();
        assert!(json.get("except_repository").is_none());
        assert!(json["time_constraint"].get("newest").is_none());
    }

    #[test]
    fn severity_names_use_display_case() {
        let action: SecurityScanAction = serde_json::from_str(
            r#"{"assessment": "risk accepted", "severity": "Low"}"#,
        )
        .unwrap();
        assert_eq!(action.severity, Some(VulnerabilitySeverity::Low));
        assert!(!action.ignore);
    }
}
