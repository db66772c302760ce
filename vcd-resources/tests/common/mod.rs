//! Shared test utilities: an in-process mock of the vCD cloud API.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{post, put},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, watch};

use vcd_resources::{ClientConfig, ProviderRegistry, ResourceReconciler, VcdClient};

pub const TEST_TOKEN: &str = "test-session-token";

/// Which session header a successful login answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginToken {
    /// `x-vmware-vcloud-access-token`, vCD 10.0 and later.
    Bearer,
    /// `x-vcloud-authorization`, older releases.
    Legacy,
    None,
}

/// A request the mock has seen.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub method: &'static str,
    pub path: String,
    pub authorization: Option<String>,
    pub vcloud_authorization: Option<String>,
    pub body: Value,
}

/// Mutable mock behaviour and recorded traffic.
#[derive(Debug)]
pub struct MockState {
    /// Registered NSX-T managers, as returned by the listing.
    pub managers: Vec<Value>,
    /// Status for POST; 200 stores the record.
    pub create_status: u16,
    /// Status override for PUT.
    pub update_status: Option<u16>,
    /// Status override for DELETE.
    pub delete_status: Option<u16>,
    /// Status override for the listing.
    pub list_status: Option<u16>,
    /// Records per listing page.
    pub page_size: usize,
    /// Artificial latency for every request.
    pub delay: Option<Duration>,
    /// Status for login; 200 returns a token.
    pub login_status: u16,
    pub login_token: LoginToken,
    pub requests: Vec<Recorded>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            managers: Vec::new(),
            create_status: 200,
            update_status: None,
            delete_status: None,
            list_status: None,
            page_size: 128,
            delay: None,
            login_status: 200,
            login_token: LoginToken::Bearer,
            requests: Vec::new(),
        }
    }
}

type Shared = Arc<Mutex<MockState>>;

pub fn manager_record(id: &str, url: &str) -> Value {
    json!({
        "id": id,
        "url": url,
        "username": "admin",
        "networkProviderScope": "default-scope"
    })
}

async fn record(
    state: &Shared,
    method: &'static str,
    path: String,
    headers: &HeaderMap,
    body: Value,
) -> MockStateSnapshot {
    let mut s = state.lock().await;
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    s.requests.push(Recorded {
        method,
        path,
        authorization: header("authorization"),
        vcloud_authorization: header("x-vcloud-authorization"),
        body,
    });
    MockStateSnapshot { delay: s.delay }
}

struct MockStateSnapshot {
    delay: Option<Duration>,
}

impl MockStateSnapshot {
    async fn wait(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn error_body(code: u16) -> Value {
    json!({"minorErrorCode": "MOCK_ERROR", "message": format!("mock failure {}", code)})
}

async fn login(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let snapshot = record(&state, "POST", "/api/sessions".to_string(), &headers, Value::Null).await;
    snapshot.wait().await;

    let (login_status, login_token) = {
        let s = state.lock().await;
        (s.login_status, s.login_token)
    };
    let basic = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Basic "));

    if login_status != 200 || !basic {
        return (StatusCode::UNAUTHORIZED, Json(error_body(401))).into_response();
    }

    let mut response = (StatusCode::OK, Json(json!({"user": "admin"}))).into_response();
    let header = match login_token {
        LoginToken::Bearer => Some("x-vmware-vcloud-access-token"),
        LoginToken::Legacy => Some("x-vcloud-authorization"),
        LoginToken::None => None,
    };
    if let Some(name) = header {
        response
            .headers_mut()
            .insert(name, HeaderValue::from_static(TEST_TOKEN));
    }
    response
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageQuery {
    page: Option<usize>,
}

async fn list_managers(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Response {
    let page = query.page.unwrap_or(1).max(1);
    let snapshot = record(
        &state,
        "GET",
        format!("/cloudapi/1.0.0/nsxTResources?page={}", page),
        &headers,
        Value::Null,
    )
    .await;
    snapshot.wait().await;

    let s = state.lock().await;
    if let Some(code) = s.list_status {
        return (status(code), Json(error_body(code))).into_response();
    }

    let page_size = s.page_size.max(1);
    let page_count = s.managers.len().div_ceil(page_size);
    let values: Vec<Value> = s
        .managers
        .iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .cloned()
        .collect();

    Json(json!({
        "resultTotal": s.managers.len(),
        "pageCount": page_count,
        "page": page,
        "pageSize": page_size,
        "values": values
    }))
    .into_response()
}

async fn create_manager(State(state): State<Shared>, headers: HeaderMap, body: String) -> Response {
    let payload: Value = serde_json::from_str(&body).unwrap_or(Value::String(body));
    let snapshot = record(
        &state,
        "POST",
        "/cloudapi/1.0.0/nsxTResources".to_string(),
        &headers,
        payload.clone(),
    )
    .await;
    snapshot.wait().await;

    let mut s = state.lock().await;
    if s.create_status != 200 {
        let code = s.create_status;
        return (status(code), Json(error_body(code))).into_response();
    }

    let mut created = payload;
    if let Some(obj) = created.as_object_mut() {
        obj.remove("password");
        obj.insert(
            "id".to_string(),
            json!(format!("urn:vcloud:nsxtmanager:{}", uuid::Uuid::new_v4())),
        );
    }
    s.managers.push(created.clone());
    Json(created).into_response()
}

async fn update_manager(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let payload: Value = serde_json::from_str(&body).unwrap_or(Value::String(body));
    let snapshot = record(
        &state,
        "PUT",
        format!("/cloudapi/1.0.0/nsxTResources/{}", id),
        &headers,
        payload.clone(),
    )
    .await;
    snapshot.wait().await;

    let mut s = state.lock().await;
    if let Some(code) = s.update_status {
        return (status(code), Json(error_body(code))).into_response();
    }

    match s
        .managers
        .iter_mut()
        .find(|m| m.get("id").and_then(Value::as_str) == Some(id.as_str()))
    {
        Some(existing) => {
            let mut updated = payload;
            if let Some(obj) = updated.as_object_mut() {
                obj.remove("password");
            }
            *existing = updated.clone();
            Json(updated).into_response()
        }
        None => (StatusCode::NOT_FOUND, Json(error_body(404))).into_response(),
    }
}

async fn delete_manager(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let snapshot = record(
        &state,
        "DELETE",
        format!("/cloudapi/1.0.0/nsxTResources/{}", id),
        &headers,
        Value::Null,
    )
    .await;
    snapshot.wait().await;

    let mut s = state.lock().await;
    if let Some(code) = s.delete_status {
        return (status(code), Json(error_body(code))).into_response();
    }

    let before = s.managers.len();
    s.managers
        .retain(|m| m.get("id").and_then(Value::as_str) != Some(id.as_str()));
    if s.managers.len() == before {
        return (StatusCode::NOT_FOUND, Json(error_body(404))).into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

/// Mock vCD server bound to an ephemeral port.
pub struct MockVcd {
    pub addr: SocketAddr,
    pub state: Shared,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl MockVcd {
    pub async fn spawn() -> Self {
        Self::spawn_with(MockState::default()).await
    }

    pub async fn spawn_with(initial: MockState) -> Self {
        let state: Shared = Arc::new(Mutex::new(initial));

        let router = Router::new()
            .route("/api/sessions", post(login))
            .route(
                "/cloudapi/1.0.0/nsxTResources",
                post(create_manager).get(list_managers),
            )
            .route(
                "/cloudapi/1.0.0/nsxTResources/{id}",
                put(update_manager).delete(delete_manager),
            )
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Server error");
        });

        Self {
            addr,
            state,
            shutdown_tx,
        }
    }

    /// `host` parameter pointing at this mock.
    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    pub fn client_config(&self, timeout: Duration) -> ClientConfig {
        ClientConfig {
            host: self.host(),
            api_version: "32.0".to_string(),
            verify_ssl_certs: true,
            timeout,
        }
    }

    /// Reconciler with the default providers, wired to this mock.
    pub fn reconciler(&self) -> ResourceReconciler {
        let (_tx, rx) = watch::channel(false);
        let client = VcdClient::new(&self.client_config(Duration::from_secs(5)), rx)
            .expect("Failed to build client");
        ResourceReconciler::new(ProviderRegistry::with_defaults(), client)
    }

    pub async fn requests(&self) -> Vec<Recorded> {
        self.state.lock().await.requests.clone()
    }

    pub async fn managers(&self) -> Vec<Value> {
        self.state.lock().await.managers.clone()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}
