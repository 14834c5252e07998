//! Audit events emitted by the account processor.
//!
//! One logical mutation emits at most one event; policy changes ride
//! along as attachments, one per changed policy kind. Unchanged kinds
//! are omitted, which is what makes repeated identical PUTs silent.

use accounts_sdk::Account;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditAction {
    CreateAccount,
    UpdateAccount,
    DeleteAccount,
    IssueSubleaseToken,
}

/// A policy kind whose persisted blob changed in this mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    Rbac,
    Gc,
    Tag,
    SecurityScan,
    Validation,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditAttachment {
    pub kind: PolicyKind,
    /// The new persisted value of the policy blob.
    pub content: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub action: AuditAction,
    pub account_name: String,
    pub auth_tenant_id: String,
    /// Name of the acting user; absent for internal actors such as the
    /// deletion sweeper.
    pub user_name: Option<String>,
    pub attachments: Vec<AuditAttachment>,
    pub recorded_at: DateTime<Utc>,
}

/// Sink for audit events. Deployments forward these to their audit
/// trail; tests collect them.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Compute the attachments for a transition from `before` to `after`.
///
/// `before` is `None` on account creation, which makes every non-empty
/// policy set an attachment.
pub fn policy_diff_attachments(before: Option<&Account>, after: &Account) -> Vec<AuditAttachment> {
    fn push_if_changed<T: Serialize + PartialEq>(
        out: &mut Vec<AuditAttachment>,
        kind: PolicyKind,
        before: Option<&[T]>,
        after: &[T],
    ) {
        let unchanged = match before {
            Some(before) => before == after,
            None => after.is_empty(),
        };
        if !unchanged {
            let content = serde_json::to_value(after).unwrap_or(serde_json::Value::Null);
            out.push(AuditAttachment { kind, content });
        }
    }

    let mut attachments = Vec::new();
    push_if_changed(
        &mut attachments,
        PolicyKind::Rbac,
        before.map(|a| a.rbac_policies.as_slice()),
        &after.rbac_policies,
    );
    push_if_changed(
        &mut attachments,
        PolicyKind::Gc,
        before.map(|a| a.gc_policies.as_slice()),
        &after.gc_policies,
    );
    push_if_changed(
        &mut attachments,
        PolicyKind::Tag,
        before.map(|a| a.tag_policies.as_slice()),
        &after.tag_policies,
    );
    push_if_changed(
        &mut attachments,
        PolicyKind::SecurityScan,
        before.map(|a| a.security_scan_policies.as_slice()),
        &after.security_scan_policies,
    );
    push_if_changed(
        &mut attachments,
        PolicyKind::Validation,
        before.map(|a| a.required_labels.as_slice()),
        &after.required_labels,
    );
    attachments
}
