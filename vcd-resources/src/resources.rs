//! Resource reconciler - drives every managed sub-resource toward the
//! declared state and aggregates the outcomes.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::info;

use crate::audit::AuditLogger;
use crate::client::VcdClient;
use crate::error::{ReconcileError, Result};
use crate::params::{Action, DesiredState, Invocation, Operation, ResourceSpec};
use crate::reconciler::{OperationOutcome, Provider, ProviderRegistry};

/// Outcome of one reconcile invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileResult {
    outcomes: BTreeMap<String, OperationOutcome>,
}

impl ReconcileResult {
    /// True iff at least one sub-resource operation changed remote state.
    pub fn changed(&self) -> bool {
        self.outcomes.values().any(|o| o.mutated)
    }

    pub fn outcomes(&self) -> &BTreeMap<String, OperationOutcome> {
        &self.outcomes
    }

    pub fn outcome(&self, resource: &str) -> Option<&OperationOutcome> {
        self.outcomes.get(resource)
    }
}

/// Reconciles a resource spec against one vCD installation.
pub struct ResourceReconciler {
    registry: ProviderRegistry,
    client: VcdClient,
    audit: AuditLogger,
}

impl ResourceReconciler {
    pub fn new(registry: ProviderRegistry, client: VcdClient) -> Self {
        Self {
            registry,
            client,
            audit: AuditLogger::new("vcd_resources"),
        }
    }

    /// Converge to `state` (`present`, `absent` or `update`).
    pub async fn reconcile(&self, state: &str, spec: &ResourceSpec) -> Result<ReconcileResult> {
        let state: DesiredState = state.parse()?;
        self.apply(Invocation::State(state), spec).await
    }

    /// Query every managed sub-resource without changing anything.
    pub async fn read(&self, spec: &ResourceSpec) -> Result<ReconcileResult> {
        self.apply(Invocation::Operation(Operation::Read), spec)
            .await
    }

    /// Run one operation over every managed sub-resource, in name order.
    ///
    /// Configurations are checked and providers resolved for all
    /// sub-resources before the first request, so a malformed or unsupported
    /// sub-resource fails the invocation without side effects. The first
    /// failing call aborts the rest.
    pub async fn apply(
        &self,
        invocation: Invocation,
        spec: &ResourceSpec,
    ) -> Result<ReconcileResult> {
        let action = invocation.action();

        let plan = spec
            .iter()
            .map(|(name, config)| {
                if !config.is_object() {
                    return Err(ReconcileError::InvalidConfig {
                        resource: name.to_string(),
                        reason: "configuration must be an object".to_string(),
                    });
                }
                self.registry
                    .lookup(name, action)
                    .map(|provider| (name, config, provider))
            })
            .collect::<Result<Vec<(&str, &Value, &dyn Provider)>>>()?;

        info!(
            "Reconciling {} sub-resource(s) with {}",
            plan.len(),
            action
        );

        let mut outcomes = BTreeMap::new();
        for (name, config, provider) in plan {
            let outcome = match action {
                Action::Create => provider.create(&self.client, config).await,
                Action::Destroy => provider.destroy(&self.client, config).await,
                Action::Modify => provider.modify(&self.client, config).await,
                Action::Read => provider.read(&self.client, config).await,
            };

            let outcome = outcome.inspect_err(|e| self.audit.failed(name, action, e))?;
            if outcome.mutated {
                self.audit.changed(name, action, outcome.status);
            }
            outcomes.insert(name.to_string(), outcome);
        }

        Ok(ReconcileResult { outcomes })
    }
}
