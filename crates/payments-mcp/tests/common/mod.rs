// crates/payments-mcp/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared servers, tools, and API fakes for transport tests.
// Purpose: Provide deterministic in-memory collaborators.
// Dependencies: payments-mcp
// ============================================================================

//! ## Overview
//! The downstream API fake echoes the key of the credential it was bound to,
//! and the recording tool captures the request context each call arrives
//! with, so tests can observe authentication and correlation end to end.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use payments_mcp::ApiClients;
use payments_mcp::ApiError;
use payments_mcp::BearerCredentialAuth;
use payments_mcp::Credential;
use payments_mcp::McpServer;
use payments_mcp::NoopHooks;
use payments_mcp::PaymentApi;
use payments_mcp::PaymentApiFactory;
use payments_mcp::RequestContext;
use payments_mcp::ServerInfo;
use payments_mcp::Tool;
use payments_mcp::ToolHandler;
use payments_mcp::ToolSink;
use payments_mcp::TrustedLocalAuth;
use payments_mcp::api::ApiRequest;
use payments_mcp::api::HttpMethod;
use payments_mcp::tools::ToolContext;
use payments_mcp::tools::ToolError;
use payments_mcp_config::ServerConfig;
use payments_mcp_config::ServerTransport;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Fakes
// ============================================================================

/// Downstream API echoing its bound key.
pub struct EchoApi {
    key: String,
}

#[async_trait]
impl PaymentApi for EchoApi {
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        Ok(json!({"key": self.key, "path": request.path}))
    }
}

/// Factory producing [`EchoApi`] clients.
pub struct EchoFactory;

impl PaymentApiFactory for EchoFactory {
    fn connect(&self, credential: &Credential) -> Result<Arc<dyn PaymentApi>, ApiError> {
        Ok(Arc::new(EchoApi {
            key: credential.key().to_string(),
        }))
    }
}

/// Context snapshot captured by [`RecordingTool`].
#[derive(Clone)]
pub struct SeenCall {
    pub credential: Option<Credential>,
    pub task_id: Option<String>,
    pub request_id: Option<String>,
    pub merchant_id: Option<String>,
}

/// Tool recording its request context and forwarding to the API.
#[derive(Default)]
pub struct RecordingTool {
    pub seen: Mutex<Vec<SeenCall>>,
}

#[async_trait]
impl ToolHandler for RecordingTool {
    async fn call(&self, context: &ToolContext, _arguments: Value) -> Result<Value, ToolError> {
        let request: &RequestContext = context.request();
        self.seen.lock().unwrap().push(SeenCall {
            credential: request.credential().cloned(),
            task_id: request.task_id().map(str::to_string),
            request_id: request.request_id().map(str::to_string),
            merchant_id: request.merchant_id().map(str::to_string),
        });
        let api_request = ApiRequest {
            method: HttpMethod::Get,
            path: vec!["payments".to_string()],
            query: Vec::new(),
            body: None,
        };
        Ok(context.client().send(api_request).await?)
    }
}

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Tool named `record` backed by `handler`.
pub fn record_tool(handler: &Arc<RecordingTool>) -> Tool {
    Tool::new("record", "Records its request context", Vec::new(), handler.clone())
}

/// Server authenticating each call from its bearer token.
pub fn network_server(handler: &Arc<RecordingTool>) -> Arc<McpServer> {
    let mut server = McpServer::new(
        ServerInfo::default(),
        Arc::new(BearerCredentialAuth),
        Arc::new(NoopHooks),
        ApiClients::per_request(Arc::new(EchoFactory)),
    );
    server.add_tools(vec![record_tool(handler)]);
    Arc::new(server)
}

/// Server bound to one trusted local credential.
pub fn stdio_server(handler: &Arc<RecordingTool>, key: &str) -> Arc<McpServer> {
    let credential = Credential::new(key, "local-secret");
    let clients = ApiClients::bound(Arc::new(EchoFactory), &credential).unwrap();
    let mut server = McpServer::new(
        ServerInfo::default(),
        Arc::new(TrustedLocalAuth::new(credential)),
        Arc::new(NoopHooks),
        clients,
    );
    server.add_tools(vec![record_tool(handler)]);
    Arc::new(server)
}

/// Loopback server config on an ephemeral port.
pub fn loopback_config(transport: ServerTransport) -> ServerConfig {
    ServerConfig {
        transport,
        address: "127.0.0.1".to_string(),
        port: 0,
        max_body_bytes: 4 * 1024,
        shutdown_timeout_ms: 2_000,
    }
}

/// `Authorization` header value for `key:secret`.
pub fn bearer(key: &str, secret: &str) -> String {
    format!("Bearer {}", STANDARD.encode(format!("{key}:{secret}")))
}

/// JSON-RPC request envelope.
pub fn rpc(id: u64, method: &str, params: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params})
}

/// `tools/call` request for the recording tool.
pub fn call_record(id: u64) -> Value {
    rpc(id, "tools/call", json!({"name": "record", "arguments": {}}))
}
