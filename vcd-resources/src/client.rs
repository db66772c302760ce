//! HTTP client for the vCD REST API.

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap};
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;

use crate::endpoints;
use crate::error::{ReconcileError, Result};
use crate::params::{Action, ModuleParams};
use crate::session::SessionToken;

/// Connection settings derived from the module parameters.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub api_version: String,
    pub verify_ssl_certs: bool,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn from_params(params: &ModuleParams, timeout: Duration) -> Result<Self> {
        let host = params
            .host
            .clone()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ReconcileError::InvalidConfig {
                resource: "connection".to_string(),
                reason: "host is required".to_string(),
            })?;

        Ok(Self {
            host,
            api_version: params
                .api_version
                .clone()
                .unwrap_or_else(|| endpoints::DEFAULT_API_VERSION.to_string()),
            verify_ssl_certs: params.verify_ssl_certs,
            timeout,
        })
    }
}

/// Which sub-resource operation a request belongs to, for error context.
#[derive(Debug, Clone, Copy)]
pub struct CallContext<'a> {
    pub resource: &'a str,
    pub action: Action,
}

/// A completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    /// Parsed JSON body, the raw text as a JSON string if it is not JSON,
    /// or `null` if empty.
    pub body: Value,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Client for one vCD installation.
pub struct VcdClient {
    http: reqwest::Client,
    base_url: String,
    api_version: String,
    session: Option<SessionToken>,
    shutdown: watch::Receiver<bool>,
}

impl VcdClient {
    /// Create a client. Sending `true` on the shutdown channel cancels
    /// in-flight requests.
    pub fn new(config: &ClientConfig, shutdown: watch::Receiver<bool>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_ssl_certs)
            .build()
            .map_err(|e| ReconcileError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: format!("http://{}", config.host),
            api_version: config.api_version.clone(),
            session: None,
            shutdown,
        })
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn set_session(&mut self, token: SessionToken) {
        self.session = Some(token);
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Start a request with the session header applied.
    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self.http.request(method, self.url(path));

        match &self.session {
            Some(SessionToken::Bearer(token)) => {
                builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
            }
            Some(SessionToken::Legacy(token)) => {
                builder = builder.header("x-vcloud-authorization", token.as_str());
            }
            None => {}
        }

        builder
    }

    /// Start a cloud API request: session header plus versioned JSON `Accept`.
    fn api_request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request(method, path).header(
            ACCEPT,
            format!("application/json;version={}", self.api_version),
        )
    }

    pub async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
        ctx: CallContext<'_>,
    ) -> Result<RawResponse> {
        self.execute(self.api_request(Method::GET, path).query(query), ctx)
            .await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
        ctx: CallContext<'_>,
    ) -> Result<RawResponse> {
        self.execute(self.api_request(Method::POST, path).json(body), ctx)
            .await
    }

    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
        ctx: CallContext<'_>,
    ) -> Result<RawResponse> {
        self.execute(self.api_request(Method::PUT, path).json(body), ctx)
            .await
    }

    pub async fn delete(&self, path: &str, ctx: CallContext<'_>) -> Result<RawResponse> {
        self.execute(self.api_request(Method::DELETE, path), ctx).await
    }

    /// Send a request and read the whole body, racing the shutdown channel.
    pub(crate) async fn execute(
        &self,
        request: RequestBuilder,
        ctx: CallContext<'_>,
    ) -> Result<RawResponse> {
        let mut shutdown = self.shutdown.clone();
        if *shutdown.borrow() {
            return Err(ReconcileError::Cancelled);
        }

        let exchange = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let headers = response.headers().clone();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, headers, text))
        };

        let cancelled = async move {
            // A dropped sender means nobody can cancel us.
            if shutdown.wait_for(|stop| *stop).await.is_err() {
                std::future::pending::<()>().await;
            }
        };

        let (status, headers, text) = tokio::select! {
            result = exchange => result.map_err(|e| map_transport_error(e, ctx))?,
            _ = cancelled => return Err(ReconcileError::Cancelled),
        };

        debug!(
            resource = ctx.resource,
            action = %ctx.action,
            status,
            "vCD call completed"
        );

        Ok(RawResponse {
            status,
            headers,
            body: parse_body(&text),
        })
    }
}

fn map_transport_error(e: reqwest::Error, ctx: CallContext<'_>) -> ReconcileError {
    if e.is_timeout() {
        ReconcileError::Timeout {
            resource: ctx.resource.to_string(),
            operation: ctx.action,
        }
    } else {
        ReconcileError::Transport(e.to_string())
    }
}

fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
