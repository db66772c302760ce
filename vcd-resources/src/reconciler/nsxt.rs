//! NSX-T manager reconciler - registers NSX-T managers with vCD.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{OperationOutcome, Provider};
use crate::client::{CallContext, VcdClient};
use crate::endpoints;
use crate::error::{ReconcileError, Result};
use crate::params::Action;

const NAME: &str = "nsxt";

/// NSX-T manager registration, as sent to vCD.
///
/// Values are forwarded as given. Fields missing from the module parameters
/// are left out of the payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NsxtConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_provider_scope: Option<Value>,
}

impl NsxtConfig {
    fn parse(config: &Value) -> Result<Self> {
        serde_json::from_value(config.clone()).map_err(|e| ReconcileError::InvalidConfig {
            resource: NAME.to_string(),
            reason: e.to_string(),
        })
    }

    fn url(&self) -> Option<&str> {
        self.url.as_ref().and_then(Value::as_str)
    }

    /// The manager URL, which identifies a registration.
    fn key(&self) -> Result<&str> {
        self.url().ok_or_else(|| ReconcileError::InvalidConfig {
            resource: NAME.to_string(),
            reason: "url is required to locate the NSX-T manager".to_string(),
        })
    }
}

/// One page of a cloud API collection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page {
    #[serde(default)]
    page_count: u32,
    #[serde(default)]
    values: Vec<Value>,
}

fn remote_error(action: Action, status: u16, body: Value) -> ReconcileError {
    ReconcileError::RemoteCall {
        resource: NAME.to_string(),
        operation: action,
        status,
        body,
    }
}

fn record_path(record: &Value) -> Result<String> {
    let id = record.get("id").and_then(Value::as_str).ok_or_else(|| {
        ReconcileError::Transport("NSX-T manager record has no id".to_string())
    })?;
    Ok(format!("{}/{}", endpoints::NSXT_MANAGERS, id))
}

/// NSX-T manager reconciler backed by the vCD cloud API.
pub struct NsxtReconciler;

impl NsxtReconciler {
    /// Walk the NSX-T manager collection looking for a registration of `url`.
    async fn find(&self, client: &VcdClient, url: &str, action: Action) -> Result<Option<Value>> {
        let ctx = CallContext {
            resource: NAME,
            action,
        };

        let mut page = 1u32;
        loop {
            let query = [
                ("page", page.to_string()),
                ("pageSize", endpoints::PAGE_SIZE.to_string()),
            ];
            let response = client.get(endpoints::NSXT_MANAGERS, &query, ctx).await?;
            if response.status != 200 {
                return Err(remote_error(action, response.status, response.body));
            }

            let listing: Page = serde_json::from_value(response.body).map_err(|e| {
                ReconcileError::Transport(format!("unexpected NSX-T manager listing: {}", e))
            })?;

            let found = listing
                .values
                .into_iter()
                .find(|v| v.get("url").and_then(Value::as_str) == Some(url));
            if found.is_some() {
                return Ok(found);
            }

            if page >= listing.page_count {
                return Ok(None);
            }
            page += 1;
        }
    }
}

#[async_trait]
impl Provider for NsxtReconciler {
    fn name(&self) -> &'static str {
        NAME
    }

    fn operations(&self) -> &'static [Action] {
        &[Action::Create, Action::Destroy, Action::Modify, Action::Read]
    }

    /// Unconditional POST: a duplicate registration is only rejected if vCD
    /// rejects it.
    async fn create(&self, client: &VcdClient, config: &Value) -> Result<OperationOutcome> {
        let nsxt = NsxtConfig::parse(config)?;
        info!(
            "Registering NSX-T manager {}",
            nsxt.url().unwrap_or("<no url>")
        );

        let ctx = CallContext {
            resource: NAME,
            action: Action::Create,
        };
        let response = client
            .post_json(endpoints::NSXT_MANAGERS, &nsxt, ctx)
            .await?;

        if response.status != 200 {
            return Err(remote_error(Action::Create, response.status, response.body));
        }

        Ok(OperationOutcome::mutated(response.status, response.body))
    }

    async fn destroy(&self, client: &VcdClient, config: &Value) -> Result<OperationOutcome> {
        let nsxt = NsxtConfig::parse(config)?;
        let url = nsxt.key()?;

        let Some(record) = self.find(client, url, Action::Destroy).await? else {
            info!("NSX-T manager {} already absent", url);
            return Ok(OperationOutcome::unchanged(404, Value::Null));
        };

        info!("Removing NSX-T manager {}", url);
        let ctx = CallContext {
            resource: NAME,
            action: Action::Destroy,
        };
        let response = client.delete(&record_path(&record)?, ctx).await?;

        match response.status {
            200 | 202 | 204 => Ok(OperationOutcome::mutated(response.status, response.body)),
            // Removed between listing and delete.
            404 => Ok(OperationOutcome::unchanged(response.status, response.body)),
            status => Err(remote_error(Action::Destroy, status, response.body)),
        }
    }

    async fn modify(&self, client: &VcdClient, config: &Value) -> Result<OperationOutcome> {
        let nsxt = NsxtConfig::parse(config)?;
        let url = nsxt.key()?;

        let record = self
            .find(client, url, Action::Modify)
            .await?
            .ok_or_else(|| ReconcileError::NotFound {
                resource: NAME.to_string(),
                key: url.to_string(),
            })?;

        info!("Updating NSX-T manager {}", url);
        let path = record_path(&record)?;

        let mut payload = serde_json::to_value(&nsxt).map_err(|e| ReconcileError::InvalidConfig {
            resource: NAME.to_string(),
            reason: e.to_string(),
        })?;
        if let (Some(obj), Some(id)) = (payload.as_object_mut(), record.get("id")) {
            obj.insert("id".to_string(), id.clone());
        }

        let ctx = CallContext {
            resource: NAME,
            action: Action::Modify,
        };
        let response = client.put_json(&path, &payload, ctx).await?;

        if response.status != 200 {
            return Err(remote_error(Action::Modify, response.status, response.body));
        }

        Ok(OperationOutcome::mutated(response.status, response.body))
    }

    async fn read(&self, client: &VcdClient, config: &Value) -> Result<OperationOutcome> {
        let nsxt = NsxtConfig::parse(config)?;
        let url = nsxt.key()?;

        Ok(match self.find(client, url, Action::Read).await? {
            Some(record) => OperationOutcome::unchanged(200, record),
            None => OperationOutcome::unchanged(404, Value::Null),
        })
    }
}
