//! Audit sink that writes events to the structured log.
//!
//! Deployments that forward audit trails elsewhere plug in their own
//! sink; the log-backed one is always a safe default.

use tracing::info;

use crate::domain::events::{AuditEvent, AuditSink};

pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn record(&self, event: AuditEvent) {
        let payload = serde_json::to_string(&event).unwrap_or_else(|_| "<unserializable>".into());
        info!(target: "audit", account = %event.account_name, event = %payload, "audit event");
    }
}
