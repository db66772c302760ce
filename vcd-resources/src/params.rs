//! Module parameters and the declared-state vocabulary.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{ReconcileError, Result};

/// Declared state for every managed sub-resource in one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesiredState {
    Present,
    Absent,
    Update,
}

impl FromStr for DesiredState {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "present" => Ok(DesiredState::Present),
            "absent" => Ok(DesiredState::Absent),
            "update" => Ok(DesiredState::Update),
            other => Err(ReconcileError::InvalidState(other.to_string())),
        }
    }
}

impl DesiredState {
    /// The provider operation this state maps onto.
    pub fn action(self) -> Action {
        match self {
            DesiredState::Present => Action::Create,
            DesiredState::Absent => Action::Destroy,
            DesiredState::Update => Action::Modify,
        }
    }
}

/// Query-only operations, requested via `operation` instead of `state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
}

impl FromStr for Operation {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "read" => Ok(Operation::Read),
            other => Err(ReconcileError::InvalidOperation(other.to_string())),
        }
    }
}

/// A single provider operation, used for dispatch and error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Destroy,
    Modify,
    Read,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Create => "create",
            Action::Destroy => "destroy",
            Action::Modify => "modify",
            Action::Read => "read",
        };
        f.write_str(s)
    }
}

/// What the invocation asked for: a state to converge to, or a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    State(DesiredState),
    Operation(Operation),
}

impl Invocation {
    pub fn action(self) -> Action {
        match self {
            Invocation::State(state) => state.action(),
            Invocation::Operation(Operation::Read) => Action::Read,
        }
    }
}

/// Sub-resource name to configuration, for the sub-resources managed in
/// this invocation only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceSpec {
    entries: BTreeMap<String, Value>,
}

impl ResourceSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sub-resource. `None`, `null` and empty values leave it unmanaged.
    pub fn with(mut self, name: &str, config: Option<Value>) -> Self {
        if let Some(config) = config.filter(is_configured) {
            self.entries.insert(name.to_string(), config);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_configured(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(n) => n.as_f64() != Some(0.0),
    }
}

/// Accept a bare number where a string is expected, e.g. an unquoted
/// `api_version: 32.0`.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a string or number, got {}",
            other
        ))),
    }
}

fn default_verify_ssl_certs() -> bool {
    true
}

/// The argument document handed over by the host runtime.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleParams {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default)]
    pub nsxt: Option<Value>,
    #[serde(default)]
    pub vcenter: Option<Value>,

    // Connection
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub org: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub api_version: Option<String>,
    #[serde(default = "default_verify_ssl_certs")]
    pub verify_ssl_certs: bool,

    #[serde(rename = "_ansible_check_mode", default)]
    pub check_mode: bool,
}

impl Default for ModuleParams {
    fn default() -> Self {
        Self {
            state: None,
            operation: None,
            nsxt: None,
            vcenter: None,
            host: None,
            user: None,
            password: None,
            org: None,
            api_version: None,
            verify_ssl_certs: default_verify_ssl_certs(),
            check_mode: false,
        }
    }
}

impl ModuleParams {
    /// Resolve `state`/`operation` into what to run. `state` wins when both
    /// are present.
    pub fn invocation(&self) -> Result<Invocation> {
        if let Some(state) = self.state.as_deref() {
            return Ok(Invocation::State(state.parse()?));
        }
        if let Some(operation) = self.operation.as_deref() {
            return Ok(Invocation::Operation(operation.parse()?));
        }
        Err(ReconcileError::MissingAction)
    }

    /// Collect the managed sub-resources.
    pub fn resource_spec(&self) -> ResourceSpec {
        ResourceSpec::new()
            .with("nsxt", self.nsxt.clone())
            .with("vcenter", self.vcenter.clone())
    }
}
