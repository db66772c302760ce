//! Sub-resource providers.
//!
//! Each provider knows how to create, destroy, modify and read one kind of
//! vCD infrastructure resource. The registry maps sub-resource names to
//! providers; a name without a provider, or an operation a provider does not
//! implement, is rejected before any request is sent for it.

pub mod nsxt;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::client::VcdClient;
use crate::error::{ReconcileError, Result};
use crate::params::Action;

/// Result of one operation on one sub-resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationOutcome {
    pub status: u16,
    #[serde(rename = "msg")]
    pub body: Value,
    /// Whether remote state was changed by this operation.
    #[serde(skip)]
    pub mutated: bool,
}

impl OperationOutcome {
    pub fn mutated(status: u16, body: Value) -> Self {
        Self {
            status,
            body,
            mutated: true,
        }
    }

    pub fn unchanged(status: u16, body: Value) -> Self {
        Self {
            status,
            body,
            mutated: false,
        }
    }
}

fn unsupported(resource: &str, operation: Action) -> ReconcileError {
    ReconcileError::Unsupported {
        resource: resource.to_string(),
        operation,
    }
}

/// Trait for sub-resource providers.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Sub-resource name this provider manages (the module parameter key).
    fn name(&self) -> &'static str;

    /// Operations this provider implements.
    fn operations(&self) -> &'static [Action];

    /// Register the sub-resource with vCD.
    async fn create(&self, _client: &VcdClient, _config: &Value) -> Result<OperationOutcome> {
        Err(unsupported(self.name(), Action::Create))
    }

    /// Remove the sub-resource. Already absent is a no-op, not an error.
    async fn destroy(&self, _client: &VcdClient, _config: &Value) -> Result<OperationOutcome> {
        Err(unsupported(self.name(), Action::Destroy))
    }

    /// Update an existing sub-resource. Fails if it does not exist.
    async fn modify(&self, _client: &VcdClient, _config: &Value) -> Result<OperationOutcome> {
        Err(unsupported(self.name(), Action::Modify))
    }

    /// Query current remote state. Never mutates.
    async fn read(&self, _client: &VcdClient, _config: &Value) -> Result<OperationOutcome> {
        Err(unsupported(self.name(), Action::Read))
    }
}

/// Capability lookup from sub-resource name to provider.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<&'static str, Box<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every provider this crate ships.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(nsxt::NsxtReconciler));
        registry
    }

    pub fn register(&mut self, provider: Box<dyn Provider>) {
        self.providers.insert(provider.name(), provider);
    }

    /// Find the provider for `resource` that implements `action`.
    pub fn lookup(&self, resource: &str, action: Action) -> Result<&dyn Provider> {
        self.providers
            .get(resource)
            .map(|p| p.as_ref())
            .filter(|p| p.operations().contains(&action))
            .ok_or_else(|| unsupported(resource, action))
    }
}
