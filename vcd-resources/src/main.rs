//! vcd-resources: Add/Delete/Update vCD infrastructure resources.
//!
//! Runs as an Ansible binary module: the first argument is a JSON file with
//! the module parameters, and one JSON response object is printed to stdout.
//! Flags override values from the file, which makes the binary usable on its
//! own as well.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vcd_resources::host::load_params;
use vcd_resources::{AnsibleHost, ModuleHost, ModuleParams, endpoints, run_module};

/// Add/Delete/Update vCD infrastructure resources
#[derive(Parser, Debug)]
#[command(name = "vcd-resources", version, about)]
struct Args {
    /// JSON file with module parameters (Ansible binary module convention)
    args_file: Option<PathBuf>,

    /// vCloud Director host address
    #[arg(long)]
    host: Option<String>,

    /// vCloud Director user name
    #[arg(long)]
    user: Option<String>,

    /// vCloud Director user password
    #[arg(long)]
    password: Option<String>,

    /// Organization to log in to
    #[arg(long)]
    org: Option<String>,

    /// API version sent in the Accept header
    #[arg(long)]
    api_version: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long)]
    insecure: bool,

    /// Desired state (present, absent, update)
    #[arg(long)]
    state: Option<String>,

    /// Query operation (read)
    #[arg(long)]
    operation: Option<String>,

    /// NSX-T manager configuration as JSON
    #[arg(long, value_parser = parse_json)]
    nsxt: Option<Value>,

    /// vCenter configuration as JSON
    #[arg(long, value_parser = parse_json)]
    vcenter: Option<Value>,

    /// Report what would happen without calling vCD
    #[arg(long)]
    check: bool,

    /// Per-request timeout in seconds
    #[arg(
        long,
        default_value_t = endpoints::DEFAULT_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout: u64,
}

fn parse_json(s: &str) -> Result<Value, String> {
    serde_json::from_str(s).map_err(|e| format!("invalid JSON: {}", e))
}

fn load_failure_message(path: &Path, err: &anyhow::Error) -> String {
    format!(
        "Failed to read module arguments from {}: {:#}",
        path.display(),
        err
    )
}

/// Report a failure that happened before the parameters were known.
fn report_load_failure<W: Write + Send>(msg: &str, out: W) -> std::io::Result<W> {
    let host = AnsibleHost::new(ModuleParams::default(), out);
    host.report_failure(msg)?;
    Ok(host.into_inner())
}

impl Args {
    /// Apply flag values on top of the parameters from the arguments file.
    fn merge_into(self, mut params: ModuleParams) -> ModuleParams {
        if self.host.is_some() {
            params.host = self.host;
        }
        if self.user.is_some() {
            params.user = self.user;
        }
        if self.password.is_some() {
            params.password = self.password;
        }
        if self.org.is_some() {
            params.org = self.org;
        }
        if self.api_version.is_some() {
            params.api_version = self.api_version;
        }
        if self.state.is_some() {
            params.state = self.state;
        }
        if self.operation.is_some() {
            params.operation = self.operation;
        }
        if self.nsxt.is_some() {
            params.nsxt = self.nsxt;
        }
        if self.vcenter.is_some() {
            params.vcenter = self.vcenter;
        }
        if self.insecure {
            params.verify_ssl_certs = false;
        }
        if self.check {
            params.check_mode = true;
        }
        params
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // stdout carries the module response, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vcd_resources=info,audit=info,reqwest=warn,hyper=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let timeout = Duration::from_secs(args.timeout);

    let params = match &args.args_file {
        Some(path) => match load_params(path).await {
            Ok(params) => params,
            Err(e) => {
                let msg = load_failure_message(path, &e);
                error!("{}", msg);
                report_load_failure(&msg, std::io::stdout())
                    .context("Failed to write module response")?;
                return Ok(ExitCode::FAILURE);
            }
        },
        None => ModuleParams::default(),
    };
    let params = args.merge_into(params);

    info!(
        "Starting vcd-resources against {}",
        params.host.as_deref().unwrap_or("<no host>")
    );

    // Cancel in-flight calls on Ctrl-C
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling reconcile");
            let _ = shutdown_tx.send(true);
        }
    });

    let host = AnsibleHost::new(params, std::io::stdout());
    let ok = run_module(&host, timeout, shutdown_rx)
        .await
        .context("Failed to write module response")?;

    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
