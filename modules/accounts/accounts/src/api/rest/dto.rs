//! Request and response bodies of the account API.
//!
//! Unknown top-level fields are rejected so typos fail loudly instead of
//! being silently dropped.

use accounts_sdk::{
    Account, GcPolicy, Platform, RbacPolicy, ReplicationPolicy, SecurityScanPolicy, TagPolicy,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PutAccountRequest {
    pub account: AccountRequestBody,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountRequestBody {
    /// Optional echo of the URL name; rejected when it disagrees.
    #[serde(default)]
    pub name: Option<String>,
    pub auth_tenant_id: String,
    #[serde(default)]
    pub replication: Option<ReplicationPolicy>,
    #[serde(default)]
    pub platform_filter: Option<Vec<Platform>>,
    #[serde(default)]
    pub rbac_policies: Option<Vec<RbacPolicy>>,
    #[serde(default)]
    pub gc_policies: Option<Vec<GcPolicy>>,
    #[serde(default)]
    pub tag_policies: Option<Vec<TagPolicy>>,
    #[serde(default)]
    pub validation: Option<ValidationBody>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationBody {
    #[serde(default)]
    pub required_labels: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AccountEnvelope {
    pub account: AccountResponse,
}

#[derive(Debug, Serialize)]
pub struct AccountListEnvelope {
    pub accounts: Vec<AccountResponse>,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub name: String,
    pub auth_tenant_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replication: Option<ReplicationPolicy>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub platform_filter: Vec<Platform>,
    pub rbac_policies: Vec<RbacPolicy>,
    pub gc_policies: Vec<GcPolicy>,
    pub tag_policies: Vec<TagPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResponse>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_managed: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_deleting: bool,
}

#[derive(Debug, Serialize)]
pub struct ValidationResponse {
    pub required_labels: Vec<String>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        AccountResponse {
            name: account.name,
            auth_tenant_id: account.auth_tenant_id,
            replication: account.replication,
            platform_filter: account.platform_filter,
            rbac_policies: account.rbac_policies,
            gc_policies: account.gc_policies,
            tag_policies: account.tag_policies,
            validation: if account.required_labels.is_empty() {
                None
            } else {
                Some(ValidationResponse {
                    required_labels: account.required_labels,
                })
            },
            is_managed: account.is_managed,
            is_deleting: account.is_deleting,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubleaseTokenEnvelope {
    pub sublease_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PutSecurityScanPoliciesRequest {
    pub security_scan_policies: Vec<SecurityScanPolicy>,
}

#[derive(Debug, Serialize)]
pub struct SecurityScanPoliciesEnvelope {
    pub security_scan_policies: Vec<SecurityScanPolicy>,
}
