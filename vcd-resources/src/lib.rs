//! vcd-resources: reconciles vCloud Director infrastructure resources.
//!
//! Given a declared `state` (`present`, `absent`, `update`) and a set of
//! sub-resource specifications (`nsxt`, `vcenter`), the reconciler issues the
//! matching create/delete/update calls against the vCD REST API and returns
//! per-sub-resource outcomes plus a derived `changed` flag.
//!
//! ```ignore
//! use vcd_resources::{ProviderRegistry, ResourceReconciler, ResourceSpec, VcdClient};
//!
//! let client = VcdClient::new(&config, shutdown_rx)?;
//! let reconciler = ResourceReconciler::new(ProviderRegistry::with_defaults(), client);
//! let spec = ResourceSpec::new().with("nsxt", Some(nsxt_config));
//! let result = reconciler.reconcile("present", &spec).await?;
//! assert!(result.changed());
//! ```

pub mod audit;
pub mod client;
pub mod endpoints;
pub mod error;
pub mod host;
pub mod params;
pub mod reconciler;
pub mod resources;
pub mod session;

pub use client::{ClientConfig, VcdClient};
pub use error::{ReconcileError, Result};
pub use host::{AnsibleHost, ModuleHost, ModuleResponse, run_module};
pub use params::{Action, DesiredState, Invocation, ModuleParams, Operation, ResourceSpec};
pub use reconciler::{OperationOutcome, Provider, ProviderRegistry};
pub use resources::{ReconcileResult, ResourceReconciler};
