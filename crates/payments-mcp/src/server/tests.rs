// crates/payments-mcp/src/server/tests.rs
// ============================================================================
// Module: MCP Server Unit Tests
// Description: Unit tests for JSON-RPC dispatch, auth gating, and hooks.
// Purpose: Validate server behavior with in-memory fixtures.
// Dependencies: payments-mcp
// ============================================================================

//! ## Overview
//! Drives [`McpServer`] directly with raw payloads. The downstream API is an
//! in-memory fake that echoes the key of the credential it was bound to.
//!
//! Security posture: tests exercise untrusted payload handling and the
//! authentication boundary for tool methods.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions and deliberate hook panics."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use axum::http::StatusCode;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use payments_mcp_config::ServerTransport;
use serde_json::Value;
use serde_json::json;

use super::INVALID_PARAMS;
use super::INVALID_REQUEST;
use super::METHOD_NOT_FOUND;
use super::McpServer;
use super::PARSE_ERROR;
use super::PAYLOAD_TOO_LARGE;
use super::RpcReply;
use super::ServerInfo;
use super::UNAUTHORIZED;
use crate::api::ApiClients;
use crate::api::ApiError;
use crate::api::ApiRequest;
use crate::api::HttpMethod;
use crate::api::PaymentApi;
use crate::api::PaymentApiFactory;
use crate::auth::BearerCredentialAuth;
use crate::auth::TrustedLocalAuth;
use crate::context::RequestContext;
use crate::credential::Credential;
use crate::hooks::McpHooks;
use crate::hooks::McpMethod;
use crate::hooks::NoopHooks;
use crate::tools::Tool;
use crate::tools::ToolContext;
use crate::tools::ToolError;
use crate::tools::ToolHandler;
use crate::toolsets::ToolSink;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Maximum payload size used by tests.
const MAX_BODY: usize = 4 * 1024;

/// Fake API echoing the key it was bound to.
struct EchoApi {
    /// Bound credential key.
    key: String,
}

#[async_trait]
impl PaymentApi for EchoApi {
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        Ok(json!({"key": self.key, "path": request.path}))
    }
}

/// Factory recording every credential it binds.
#[derive(Default)]
struct RecordingFactory {
    /// Keys bound so far.
    keys: Mutex<Vec<String>>,
}

impl PaymentApiFactory for RecordingFactory {
    fn connect(&self, credential: &Credential) -> Result<Arc<dyn PaymentApi>, ApiError> {
        self.keys.lock().unwrap().push(credential.key().to_string());
        Ok(Arc::new(EchoApi {
            key: credential.key().to_string(),
        }))
    }
}

/// Tool forwarding to the call's client.
struct ForwardingTool;

#[async_trait]
impl ToolHandler for ForwardingTool {
    async fn call(&self, context: &ToolContext, _arguments: Value) -> Result<Value, ToolError> {
        let request = ApiRequest {
            method: HttpMethod::Get,
            path: vec!["payments".to_string()],
            query: Vec::new(),
            body: None,
        };
        Ok(context.client().send(request).await?)
    }
}

/// Tool that always fails validation.
struct FailingTool;

#[async_trait]
impl ToolHandler for FailingTool {
    async fn call(&self, _context: &ToolContext, _arguments: Value) -> Result<Value, ToolError> {
        Err(ToolError::InvalidParams("missing required parameter: order_id".to_string()))
    }
}

/// Registers the fixture tools on `server`.
fn register_fixture_tools(server: &mut McpServer) {
    server.add_tools(vec![
        Tool::new("forward", "Forward to the API", Vec::new(), Arc::new(ForwardingTool)),
        Tool::new("fail", "Always fails", Vec::new(), Arc::new(FailingTool)),
    ]);
}

/// Builds a per-request (network) server.
fn network_server(hooks: Arc<dyn McpHooks>) -> (McpServer, Arc<RecordingFactory>) {
    let factory = Arc::new(RecordingFactory::default());
    let clients = ApiClients::per_request(Arc::clone(&factory) as Arc<dyn PaymentApiFactory>);
    let mut server =
        McpServer::new(ServerInfo::default(), Arc::new(BearerCredentialAuth), hooks, clients);
    register_fixture_tools(&mut server);
    (server, factory)
}

/// Builds a trusted-local (stdio) server bound to `server_key`.
fn local_server() -> McpServer {
    let factory: Arc<dyn PaymentApiFactory> = Arc::new(RecordingFactory::default());
    let credential = Credential::new("server_key", "server_secret");
    let clients = ApiClients::bound(factory, &credential).unwrap();
    let auth = Arc::new(TrustedLocalAuth::new(credential));
    let mut server = McpServer::new(ServerInfo::default(), auth, Arc::new(NoopHooks), clients);
    register_fixture_tools(&mut server);
    server
}

/// HTTP context carrying a bearer token for `key:secret`.
fn bearer_context(key: &str, secret: &str) -> RequestContext {
    let token = STANDARD.encode(format!("{key}:{secret}"));
    RequestContext::new(ServerTransport::Http).with_auth_token(token)
}

/// Sends `payload` and returns the reply.
async fn send(server: &McpServer, context: RequestContext, payload: &Value) -> RpcReply {
    let bytes = serde_json::to_vec(payload).unwrap();
    server.handle_payload(context, &bytes, MAX_BODY).await.expect("expected a reply")
}

/// Returns the JSON form of a reply body.
fn body(reply: &RpcReply) -> Value {
    serde_json::to_value(&reply.1).unwrap()
}

/// Builds a `tools/call` request.
fn call(id: i64, name: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {"name": name, "arguments": {}},
    })
}

// ============================================================================
// SECTION: Protocol Methods
// ============================================================================

#[tokio::test]
async fn initialize_reports_server_info_without_auth() {
    let (server, _) = network_server(Arc::new(NoopHooks));
    let request = json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}});
    let reply = send(&server, RequestContext::new(ServerTransport::Http), &request).await;
    assert_eq!(reply.0, StatusCode::OK);
    let body = body(&reply);
    assert_eq!(body["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(body["result"]["serverInfo"]["name"], "payments-mcp");
    assert!(body["result"]["capabilities"]["tools"].is_object());
}

#[tokio::test]
async fn initialized_notification_has_no_reply() {
    let (server, _) = network_server(Arc::new(NoopHooks));
    let payload = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
    let bytes = serde_json::to_vec(&payload).unwrap();
    let reply = server.handle_payload(RequestContext::stdio(), &bytes, MAX_BODY).await;
    assert!(reply.is_none());
}

#[tokio::test]
async fn ping_returns_empty_result() {
    let server = local_server();
    let request = json!({"jsonrpc": "2.0", "id": "p", "method": "ping"});
    let reply = send(&server, RequestContext::stdio(), &request).await;
    let body = body(&reply);
    assert_eq!(body["id"], "p");
    assert_eq!(body["result"], json!({}));
}

#[tokio::test]
async fn unknown_method_is_rejected() {
    let server = local_server();
    let request = json!({"jsonrpc": "2.0", "id": 3, "method": "resources/list"});
    let reply = send(&server, RequestContext::stdio(), &request).await;
    assert_eq!(reply.0, StatusCode::BAD_REQUEST);
    assert_eq!(body(&reply)["error"]["code"], METHOD_NOT_FOUND);
}

// ============================================================================
// SECTION: Payload Validation
// ============================================================================

#[tokio::test]
async fn oversized_payload_is_rejected() {
    let server = local_server();
    let bytes = vec![b' '; MAX_BODY + 1];
    let reply = server.handle_payload(RequestContext::stdio(), &bytes, MAX_BODY).await.unwrap();
    assert_eq!(reply.0, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body(&reply)["error"]["code"], PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn malformed_json_is_a_parse_error() {
    let server = local_server();
    let reply =
        server.handle_payload(RequestContext::stdio(), b"{not json", MAX_BODY).await.unwrap();
    assert_eq!(reply.0, StatusCode::BAD_REQUEST);
    assert_eq!(body(&reply)["error"]["code"], PARSE_ERROR);
}

#[tokio::test]
async fn wrong_shape_is_an_invalid_request() {
    let server = local_server();
    let reply = send(&server, RequestContext::stdio(), &json!({"jsonrpc": "2.0", "id": 1})).await;
    assert_eq!(body(&reply)["error"]["code"], INVALID_REQUEST);
}

#[tokio::test]
async fn wrong_version_is_an_invalid_request() {
    let server = local_server();
    let request = json!({"jsonrpc": "1.0", "id": 4, "method": "ping"});
    let reply = send(&server, RequestContext::stdio(), &request).await;
    assert_eq!(body(&reply)["error"]["code"], INVALID_REQUEST);
    assert_eq!(body(&reply)["id"], 4);
}

// ============================================================================
// SECTION: Authentication
// ============================================================================

#[tokio::test]
async fn tools_list_requires_token_on_network_server() {
    let (server, _) = network_server(Arc::new(NoopHooks));
    let request = json!({"jsonrpc": "2.0", "id": 5, "method": "tools/list"});
    let reply = send(&server, RequestContext::new(ServerTransport::Http), &request).await;
    assert_eq!(reply.0, StatusCode::UNAUTHORIZED);
    let body = body(&reply);
    assert_eq!(body["error"]["code"], UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "unauthorized: no auth token provided");
}

#[tokio::test]
async fn tools_call_rejects_invalid_token_before_running() {
    let (server, factory) = network_server(Arc::new(NoopHooks));
    let context = RequestContext::new(ServerTransport::Http).with_auth_token("%%%");
    let reply = send(&server, context, &call(6, "forward")).await;
    assert_eq!(reply.0, StatusCode::UNAUTHORIZED);
    assert_eq!(body(&reply)["error"]["message"], "unauthorized: invalid auth token");
    assert!(factory.keys.lock().unwrap().is_empty());
}

#[tokio::test]
async fn tools_list_returns_registered_tools() {
    let (server, _) = network_server(Arc::new(NoopHooks));
    let request = json!({"jsonrpc": "2.0", "id": 7, "method": "tools/list"});
    let reply = send(&server, bearer_context("k", "s"), &request).await;
    let names: Vec<Value> = body(&reply)["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|tool| tool["name"].clone())
        .collect();
    assert_eq!(names, vec![json!("forward"), json!("fail")]);
}

// ============================================================================
// SECTION: Tool Calls
// ============================================================================

#[tokio::test]
async fn tools_call_uses_call_scoped_client() {
    let (server, factory) = network_server(Arc::new(NoopHooks));
    let reply = send(&server, bearer_context("caller_a", "secret"), &call(8, "forward")).await;
    assert_eq!(reply.0, StatusCode::OK);
    let result = body(&reply)["result"].clone();
    assert_eq!(result["isError"], false);
    let text = result["content"][0]["text"].as_str().unwrap();
    let output: Value = serde_json::from_str(text).unwrap();
    assert_eq!(output["key"], "caller_a");
    send(&server, bearer_context("caller_b", "secret"), &call(9, "forward")).await;
    assert_eq!(*factory.keys.lock().unwrap(), vec!["caller_a", "caller_b"]);
}

#[tokio::test]
async fn trusted_local_call_uses_bound_client() {
    let server = local_server();
    let reply = send(&server, RequestContext::stdio(), &call(10, "forward")).await;
    let text = body(&reply)["result"]["content"][0]["text"].as_str().unwrap().to_string();
    let output: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(output["key"], "server_key");
}

#[tokio::test]
async fn tool_failure_is_an_error_result() {
    let server = local_server();
    let reply = send(&server, RequestContext::stdio(), &call(11, "fail")).await;
    assert_eq!(reply.0, StatusCode::OK);
    let result = body(&reply)["result"].clone();
    assert_eq!(result["isError"], true);
    assert_eq!(
        result["content"][0]["text"],
        "invalid parameters: missing required parameter: order_id"
    );
}

#[tokio::test]
async fn unknown_tool_is_invalid_params() {
    let server = local_server();
    let reply = send(&server, RequestContext::stdio(), &call(12, "refund_everything")).await;
    let body = body(&reply);
    assert_eq!(body["error"]["code"], INVALID_PARAMS);
    assert_eq!(body["error"]["message"], "unknown tool: refund_everything");
}

#[tokio::test]
async fn malformed_call_params_are_invalid_params() {
    let server = local_server();
    let request =
        json!({"jsonrpc": "2.0", "id": 13, "method": "tools/call", "params": {"arguments": {}}});
    let reply = send(&server, RequestContext::stdio(), &request).await;
    assert_eq!(body(&reply)["error"]["code"], INVALID_PARAMS);
}

#[test]
fn re_registering_a_tool_replaces_it() {
    let mut server = local_server();
    server.add_tools(vec![Tool::new("fail", "Replaced", Vec::new(), Arc::new(FailingTool))]);
    assert_eq!(server.tools().len(), 2);
    assert_eq!(server.tools()[1].description(), "Replaced");
}

// ============================================================================
// SECTION: Hooks
// ============================================================================

/// Hooks recording invocation order.
#[derive(Default)]
struct OrderHooks {
    /// Hook labels with the credential key seen, if any.
    seen: Mutex<Vec<String>>,
}

impl OrderHooks {
    /// Records a hook invocation.
    fn record(&self, label: &str, context: &RequestContext) {
        let key = context.credential().map(|credential| credential.key().to_string());
        self.seen.lock().unwrap().push(format!("{label}:{}", key.unwrap_or_default()));
    }
}

impl McpHooks for OrderHooks {
    fn before_any(&self, context: &RequestContext, _: McpMethod, _: &str, _: &Value) {
        self.record("before_any", context);
    }

    fn on_success(&self, context: &RequestContext, _: McpMethod, _: &str, _: &Value) {
        self.record("on_success", context);
    }

    fn on_error(&self, context: &RequestContext, _: McpMethod, _: &str, _: &str) {
        self.record("on_error", context);
    }

    fn before_call_tool(&self, context: &RequestContext, _: &str, _: &Value) {
        self.record("before_call_tool", context);
    }

    fn after_call_tool(&self, context: &RequestContext, _: &str, _: &Value, _: &Value) {
        self.record("after_call_tool", context);
    }
}

#[tokio::test]
async fn hooks_fire_in_order_with_authenticated_context() {
    let hooks = Arc::new(OrderHooks::default());
    let (server, _) = network_server(Arc::clone(&hooks) as Arc<dyn McpHooks>);
    send(&server, bearer_context("caller", "s"), &call(14, "forward")).await;
    assert_eq!(
        *hooks.seen.lock().unwrap(),
        vec![
            "before_any:",
            "before_call_tool:caller",
            "after_call_tool:caller",
            "on_success:caller",
        ]
    );
}

#[tokio::test]
async fn auth_failure_fires_on_error_hook() {
    let hooks = Arc::new(OrderHooks::default());
    let (server, _) = network_server(Arc::clone(&hooks) as Arc<dyn McpHooks>);
    send(&server, RequestContext::new(ServerTransport::Http), &call(15, "forward")).await;
    assert_eq!(*hooks.seen.lock().unwrap(), vec!["before_any:", "on_error:"]);
}

/// Hooks that panic everywhere.
struct PanickingHooks;

impl McpHooks for PanickingHooks {
    fn before_any(&self, _: &RequestContext, _: McpMethod, _: &str, _: &Value) {
        panic!("before_any");
    }

    fn on_success(&self, _: &RequestContext, _: McpMethod, _: &str, _: &Value) {
        panic!("on_success");
    }

    fn on_error(&self, _: &RequestContext, _: McpMethod, _: &str, _: &str) {
        panic!("on_error");
    }

    fn before_call_tool(&self, _: &RequestContext, _: &str, _: &Value) {
        panic!("before_call_tool");
    }

    fn after_call_tool(&self, _: &RequestContext, _: &str, _: &Value, _: &Value) {
        panic!("after_call_tool");
    }
}

#[tokio::test]
async fn panicking_hooks_do_not_change_outcome() {
    let (server, _) = network_server(Arc::new(PanickingHooks));
    let reply = send(&server, bearer_context("caller", "s"), &call(16, "forward")).await;
    assert_eq!(reply.0, StatusCode::OK);
    assert_eq!(body(&reply)["result"]["isError"], false);
}
