//! Audit events for changes made to vCD.
//!
//! Emitted on the `audit` tracing target so they can be filtered and shipped
//! separately from operational logs.

use crate::error::ReconcileError;
use crate::params::Action;

/// Audit logger for one module component.
pub struct AuditLogger {
    component: String,
}

impl AuditLogger {
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_string(),
        }
    }

    pub fn changed(&self, resource: &str, action: Action, status: u16) {
        tracing::info!(
            target: "audit",
            component = %self.component,
            resource,
            %action,
            status,
            "Sub-resource {} changed by {} ({})",
            resource,
            action,
            status
        );
    }

    pub fn failed(&self, resource: &str, action: Action, error: &ReconcileError) {
        tracing::error!(
            target: "audit",
            component = %self.component,
            resource,
            %action,
            "Sub-resource {} {} failed: {}",
            resource,
            action,
            error
        );
    }

    pub fn skipped(&self, reason: &str) {
        tracing::info!(target: "audit", component = %self.component, "Skipped: {}", reason);
    }
}
