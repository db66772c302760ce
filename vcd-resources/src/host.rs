//! Host capability interface.
//!
//! The module does not own its lifecycle: the host runtime hands over
//! parameters, may require a login, and consumes exactly one response. The
//! reconciler reaches the host only through [`ModuleHost`].

use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{error, info};

use crate::audit::AuditLogger;
use crate::client::{ClientConfig, VcdClient};
use crate::endpoints;
use crate::error::Result;
use crate::params::ModuleParams;
use crate::reconciler::ProviderRegistry;
use crate::resources::{ReconcileResult, ResourceReconciler};
use crate::session;

/// Message reported when check mode short-circuits the run.
pub const CHECK_MODE_MSG: &str = "skipped, running in check mode";

/// The single JSON object handed back to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleResponse {
    pub changed: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub failed: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    pub msg: Value,
}

impl ModuleResponse {
    pub fn success(result: &ReconcileResult) -> Self {
        // Outcomes only ever hold JSON values, serialization cannot fail.
        let msg = serde_json::to_value(result.outcomes()).unwrap_or(Value::Null);
        Self {
            changed: result.changed(),
            failed: false,
            skipped: false,
            msg,
        }
    }

    pub fn skipped() -> Self {
        Self {
            changed: false,
            failed: false,
            skipped: true,
            msg: Value::String(CHECK_MODE_MSG.to_string()),
        }
    }

    pub fn failure(msg: &str) -> Self {
        Self {
            changed: false,
            failed: true,
            skipped: false,
            msg: Value::String(msg.to_string()),
        }
    }
}

/// Capabilities the host runtime provides to the module.
#[async_trait]
pub trait ModuleHost: Send + Sync {
    /// Parameters of this invocation.
    fn params(&self) -> &ModuleParams;

    /// Log in when credentials were supplied.
    async fn authenticate(&self, client: &mut VcdClient) -> Result<()> {
        let params = self.params();
        let Some(user) = params.user.as_deref() else {
            return Ok(());
        };
        let org = params.org.as_deref().unwrap_or(endpoints::DEFAULT_ORG);
        let password = params.password.as_deref().unwrap_or_default();

        let token = session::login(client, user, password, org).await?;
        client.set_session(token);
        Ok(())
    }

    fn report_success(&self, response: &ModuleResponse) -> std::io::Result<()>;

    fn report_failure(&self, msg: &str) -> std::io::Result<()>;
}

/// Host that follows the Ansible binary module convention: parameters come
/// from a JSON file, the response goes to stdout as one JSON object.
pub struct AnsibleHost<W> {
    params: ModuleParams,
    out: Mutex<W>,
}

impl<W: Write + Send> AnsibleHost<W> {
    pub fn new(params: ModuleParams, out: W) -> Self {
        Self {
            params,
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn emit(&self, response: &ModuleResponse) -> std::io::Result<()> {
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        serde_json::to_writer(&mut *out, response)?;
        writeln!(out)?;
        out.flush()
    }
}

/// Read a JSON arguments file.
pub async fn load_params(path: &Path) -> anyhow::Result<ModuleParams> {
    let raw = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&raw)?)
}

#[async_trait]
impl<W: Write + Send> ModuleHost for AnsibleHost<W> {
    fn params(&self) -> &ModuleParams {
        &self.params
    }

    fn report_success(&self, response: &ModuleResponse) -> std::io::Result<()> {
        self.emit(response)
    }

    fn report_failure(&self, msg: &str) -> std::io::Result<()> {
        self.emit(&ModuleResponse::failure(msg))
    }
}

/// Run one module invocation against `host`. Returns whether it succeeded.
pub async fn run_module(
    host: &dyn ModuleHost,
    timeout: Duration,
    shutdown: watch::Receiver<bool>,
) -> std::io::Result<bool> {
    if host.params().check_mode {
        AuditLogger::new("vcd_resources").skipped(CHECK_MODE_MSG);
        host.report_success(&ModuleResponse::skipped())?;
        return Ok(true);
    }

    match execute(host, timeout, shutdown).await {
        Ok(result) => {
            info!(changed = result.changed(), "Reconcile finished");
            host.report_success(&ModuleResponse::success(&result))?;
            Ok(true)
        }
        Err(e) => {
            error!("Reconcile failed: {}", e);
            host.report_failure(&e.to_string())?;
            Ok(false)
        }
    }
}

async fn execute(
    host: &dyn ModuleHost,
    timeout: Duration,
    shutdown: watch::Receiver<bool>,
) -> Result<ReconcileResult> {
    let params = host.params();
    // Validate before any network traffic, login included.
    let invocation = params.invocation()?;
    let spec = params.resource_spec();

    let config = ClientConfig::from_params(params, timeout)?;
    let mut client = VcdClient::new(&config, shutdown)?;
    host.authenticate(&mut client).await?;

    let reconciler = ResourceReconciler::new(ProviderRegistry::with_defaults(), client);
    reconciler.apply(invocation, &spec).await
}
