// crates/payments-mcp/src/api/tests.rs
// ============================================================================
// Module: Payment API Client Tests
// Description: Unit tests for client resolution and the HTTP client.
// Purpose: Validate credential selection, URL building, and error mapping.
// Dependencies: payments-mcp, axum, tokio
// ============================================================================

//! ## Overview
//! Runs [`super::HttpPaymentApi`] against a loopback axum stub and checks
//! which client [`super::ApiClients`] selects for a call.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::Uri;
use axum::http::header::AUTHORIZATION;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::any;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use payments_mcp_config::ApiConfig;
use serde_json::Value;
use serde_json::json;

use super::ApiClients;
use super::ApiError;
use super::ApiRequest;
use super::HttpMethod;
use super::HttpPaymentApiFactory;
use super::PaymentApiFactory;
use super::error_message;
use crate::context::RequestContext;
use crate::credential::Credential;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Request observed by the stub.
#[derive(Debug, Clone)]
struct Observed {
    /// Request path and query.
    uri: String,
    /// Authorization header value.
    authorization: Option<String>,
    /// Decoded JSON body.
    body: Option<Value>,
}

/// Shared log of observed requests.
type ObservedLog = Arc<Mutex<Vec<Observed>>>;

/// Stub handler recording requests; `/fail` paths return a provider error.
async fn stub(
    State(log): State<ObservedLog>,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let observed = Observed {
        uri: uri.to_string(),
        authorization: headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_str(&body).ok(),
    };
    log.lock().unwrap().push(observed);
    if uri.path().ends_with("/fail") {
        let error =
            json!({"error": {"code": "BAD_REQUEST_ERROR", "description": "amount too low"}});
        return (StatusCode::BAD_REQUEST, Json(error)).into_response();
    }
    Json(json!({"id": "pay_123", "entity": "payment"})).into_response()
}

/// Spawns the stub and returns its base URL and request log.
async fn spawn_stub() -> (String, ObservedLog) {
    let log: ObservedLog = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new().fallback(any(stub)).with_state(Arc::clone(&log));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/v1"), log)
}

/// Builds a factory pointed at `base_url`.
fn factory(base_url: &str) -> Arc<HttpPaymentApiFactory> {
    let config = ApiConfig {
        base_url: base_url.to_string(),
        request_timeout_ms: 5_000,
    };
    Arc::new(HttpPaymentApiFactory::from_config(&config).unwrap())
}

/// Builds a GET request for `path`.
fn get(path: &[&str]) -> ApiRequest {
    ApiRequest {
        method: HttpMethod::Get,
        path: path.iter().map(|segment| (*segment).to_string()).collect(),
        query: Vec::new(),
        body: None,
    }
}

// ============================================================================
// SECTION: HTTP Client
// ============================================================================

#[tokio::test]
async fn http_client_sends_basic_auth_and_joins_path() {
    let (base_url, log) = spawn_stub().await;
    let client = factory(&base_url).connect(&Credential::new("rzp_key", "rzp_secret")).unwrap();
    let mut request = get(&["payments", "pay_123"]);
    request.query.push(("expand[]".to_string(), "card".to_string()));
    let response = client.send(request).await.unwrap();
    assert_eq!(response["id"], "pay_123");
    let observed = log.lock().unwrap()[0].clone();
    assert_eq!(observed.uri, "/v1/payments/pay_123?expand%5B%5D=card");
    let expected = format!("Basic {}", STANDARD.encode("rzp_key:rzp_secret"));
    assert_eq!(observed.authorization.as_deref(), Some(expected.as_str()));
}

#[tokio::test]
async fn http_client_encodes_path_segments() {
    let (base_url, log) = spawn_stub().await;
    let client = factory(&base_url).connect(&Credential::new("k", "s")).unwrap();
    client.send(get(&["payments", "../orders"])).await.unwrap();
    let observed = log.lock().unwrap()[0].clone();
    assert_eq!(observed.uri, "/v1/payments/..%2Forders");
}

#[tokio::test]
async fn http_client_sends_json_body() {
    let (base_url, log) = spawn_stub().await;
    let client = factory(&base_url).connect(&Credential::new("k", "s")).unwrap();
    let request = ApiRequest {
        method: HttpMethod::Post,
        path: vec!["orders".to_string()],
        query: Vec::new(),
        body: Some(json!({"amount": 500, "currency": "INR"})),
    };
    client.send(request).await.unwrap();
    let observed = log.lock().unwrap()[0].clone();
    assert_eq!(observed.body, Some(json!({"amount": 500, "currency": "INR"})));
}

#[tokio::test]
async fn http_client_maps_error_status_with_description() {
    let (base_url, _log) = spawn_stub().await;
    let client = factory(&base_url).connect(&Credential::new("k", "s")).unwrap();
    let err = client.send(get(&["payments", "fail"])).await.unwrap_err();
    assert_eq!(
        err,
        ApiError::Status {
            status: 400,
            message: "amount too low".to_string(),
        }
    );
}

#[test]
fn error_message_falls_back_to_truncated_body() {
    let long = "x".repeat(2_000);
    assert_eq!(error_message(long.as_bytes()).len(), 512);
    assert_eq!(error_message(b"  "), "no error description");
}

// ============================================================================
// SECTION: Client Resolution
// ============================================================================

#[tokio::test]
async fn resolve_prefers_context_credential() {
    let (base_url, log) = spawn_stub().await;
    let clients =
        ApiClients::bound(factory(&base_url), &Credential::new("server_key", "server")).unwrap();
    let context = RequestContext::stdio().with_credential(Credential::new("caller_key", "caller"));
    clients.resolve(&context).unwrap().send(get(&["payments"])).await.unwrap();
    let observed = log.lock().unwrap()[0].clone();
    let expected = format!("Basic {}", STANDARD.encode("caller_key:caller"));
    assert_eq!(observed.authorization.as_deref(), Some(expected.as_str()));
}

#[tokio::test]
async fn resolve_falls_back_to_bound_client() {
    let (base_url, log) = spawn_stub().await;
    let clients =
        ApiClients::bound(factory(&base_url), &Credential::new("server_key", "server")).unwrap();
    clients.resolve(&RequestContext::stdio()).unwrap().send(get(&["payments"])).await.unwrap();
    let observed = log.lock().unwrap()[0].clone();
    let expected = format!("Basic {}", STANDARD.encode("server_key:server"));
    assert_eq!(observed.authorization.as_deref(), Some(expected.as_str()));
}

#[test]
fn resolve_without_any_credential_fails() {
    let clients = ApiClients::per_request(factory("http://127.0.0.1:9/v1"));
    let err = clients.resolve(&RequestContext::stdio()).err().unwrap();
    assert_eq!(err, ApiError::MissingCredential);
}
