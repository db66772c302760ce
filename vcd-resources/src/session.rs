//! vCD session login.

use reqwest::Method;
use reqwest::header::ACCEPT;
use tracing::info;

use crate::client::{CallContext, VcdClient};
use crate::endpoints;
use crate::error::{ReconcileError, Result};
use crate::params::Action;

const ACCESS_TOKEN_HEADER: &str = "x-vmware-vcloud-access-token";
const LEGACY_TOKEN_HEADER: &str = "x-vcloud-authorization";

/// Token returned by a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionToken {
    /// Sent back as `Authorization: Bearer <token>`.
    Bearer(String),
    /// Sent back as `x-vcloud-authorization: <token>` (pre-10.0 releases).
    Legacy(String),
}

/// Log in as `user@org` and return the session token.
pub async fn login(
    client: &VcdClient,
    user: &str,
    password: &str,
    org: &str,
) -> Result<SessionToken> {
    info!("Logging in to vCD as {}@{}", user, org);

    let request = client
        .request(Method::POST, endpoints::SESSIONS)
        .header(
            ACCEPT,
            format!("application/*+json;version={}", client.api_version()),
        )
        .basic_auth(format!("{}@{}", user, org), Some(password));

    let ctx = CallContext {
        resource: "session",
        action: Action::Create,
    };
    let response = client.execute(request, ctx).await?;

    if !response.is_success() {
        return Err(ReconcileError::Authentication(format!(
            "{}: {}",
            response.status, response.body
        )));
    }

    let header = |name: &str| {
        response
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    if let Some(token) = header(ACCESS_TOKEN_HEADER) {
        return Ok(SessionToken::Bearer(token));
    }
    if let Some(token) = header(LEGACY_TOKEN_HEADER) {
        return Ok(SessionToken::Legacy(token));
    }

    Err(ReconcileError::Authentication(
        "no session token in login response".to_string(),
    ))
}
