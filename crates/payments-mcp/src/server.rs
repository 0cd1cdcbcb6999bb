// crates/payments-mcp/src/server.rs
// ============================================================================
// Module: MCP Server
// Description: JSON-RPC 2.0 dispatch for MCP methods.
// Purpose: Route MCP calls through authentication, hooks, and tool handlers.
// Dependencies: axum, serde, serde_json
// ============================================================================

//! ## Overview
//! [`McpServer`] is transport-agnostic: transports hand it raw payload bytes
//! plus a fresh [`RequestContext`] and get back an HTTP status with a
//! JSON-RPC response, or nothing for notifications.
//!
//! Supported methods: `initialize`, `notifications/initialized`, `ping`,
//! `tools/list`, and `tools/call`. Only the tool methods authenticate.
//! Tool failures are reported as `isError` tool results, not JSON-RPC errors.
//!
//! Security posture: payloads are untrusted; size limits and parsing failures
//! reject the request before dispatch.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::http::StatusCode;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::api::ApiClients;
use crate::api::ApiError;
use crate::auth::AuthError;
use crate::auth::AuthMode;
use crate::auth::Authenticator;
use crate::context::RequestContext;
use crate::hooks::HookPoint;
use crate::hooks::HookRunner;
use crate::hooks::McpHooks;
use crate::hooks::McpMethod;
use crate::tools::Tool;
use crate::tools::ToolContext;
use crate::tools::ToolDefinition;
use crate::toolsets::ToolSink;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// JSON-RPC protocol version.
pub const JSONRPC_VERSION: &str = "2.0";
/// MCP protocol revision advertised by `initialize`.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
/// Payload is not valid JSON.
pub const PARSE_ERROR: i64 = -32700;
/// Payload is not a valid JSON-RPC request.
pub const INVALID_REQUEST: i64 = -32600;
/// Method is not supported.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Method parameters are invalid.
pub const INVALID_PARAMS: i64 = -32602;
/// Internal server failure.
pub const INTERNAL_ERROR: i64 = -32603;
/// Caller failed authentication.
pub const UNAUTHORIZED: i64 = -32001;
/// Payload exceeds the configured size limit.
pub const PAYLOAD_TOO_LARGE: i64 = -32070;

// ============================================================================
// SECTION: JSON-RPC Types
// ============================================================================

/// Incoming JSON-RPC request. A missing `id` marks a notification.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC protocol version.
    pub jsonrpc: String,
    /// Request identifier.
    #[serde(default)]
    pub id: Option<Value>,
    /// Method name.
    pub method: String,
    /// Optional parameters payload.
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC protocol version.
    pub jsonrpc: &'static str,
    /// Request identifier.
    pub id: Value,
    /// Successful result payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload when the request fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Builds a success response.
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Builds an error response.
    #[must_use]
    pub fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// JSON-RPC error payload.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP status paired with a JSON-RPC response.
pub type RpcReply = (StatusCode, JsonRpcResponse);

/// `tools/call` parameters.
#[derive(Debug, Deserialize)]
struct ToolCallParams {
    /// Tool name.
    name: String,
    /// Raw JSON arguments.
    #[serde(default)]
    arguments: Value,
}

/// `tools/list` result payload.
#[derive(Debug, Serialize)]
struct ToolListResult {
    /// Registered tool definitions.
    tools: Vec<ToolDefinition>,
}

/// `tools/call` result payload.
#[derive(Debug, Serialize)]
struct ToolCallResult {
    /// Tool output content.
    content: Vec<ToolContent>,
    /// True when the tool failed.
    #[serde(rename = "isError")]
    is_error: bool,
}

impl ToolCallResult {
    /// Wraps successful tool output.
    fn success(output: &Value) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: output.to_string(),
            }],
            is_error: false,
        }
    }

    /// Wraps a tool failure message.
    fn failure(message: String) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message,
            }],
            is_error: true,
        }
    }
}

/// Tool output content blocks.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ToolContent {
    /// Text content.
    Text {
        /// Text payload.
        text: String,
    },
}

/// Dispatch failure mapped to a JSON-RPC error.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RpcFailure {
    /// HTTP status for network transports.
    status: StatusCode,
    /// JSON-RPC error code.
    code: i64,
    /// Error message.
    message: String,
}

impl RpcFailure {
    /// Builds a failure.
    fn new(status: StatusCode, code: i64, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    /// Builds an invalid-params failure.
    fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, INVALID_PARAMS, message)
    }

    /// Converts the failure into a reply for `id`.
    fn into_reply(self, id: Value) -> RpcReply {
        (self.status, JsonRpcResponse::failure(id, self.code, self.message))
    }
}

impl From<AuthError> for RpcFailure {
    fn from(error: AuthError) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, UNAUTHORIZED, error.to_string())
    }
}

impl From<ApiError> for RpcFailure {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::MissingCredential => {
                Self::new(StatusCode::UNAUTHORIZED, UNAUTHORIZED, error.to_string())
            }
            other => Self::new(StatusCode::OK, INTERNAL_ERROR, other.to_string()),
        }
    }
}

// ============================================================================
// SECTION: MCP Server
// ============================================================================

/// Server identity reported by `initialize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: "payments-mcp".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// MCP server instance.
pub struct McpServer {
    /// Server identity.
    info: ServerInfo,
    /// Registered tools in registration order.
    tools: Vec<Tool>,
    /// Authenticator for tool methods.
    authenticator: Arc<dyn Authenticator>,
    /// Instrumentation hooks.
    hooks: HookRunner,
    /// Downstream client resolver.
    clients: ApiClients,
}

impl McpServer {
    /// Builds a server with no tools registered.
    #[must_use]
    pub fn new(
        info: ServerInfo,
        authenticator: Arc<dyn Authenticator>,
        hooks: Arc<dyn McpHooks>,
        clients: ApiClients,
    ) -> Self {
        Self {
            info,
            tools: Vec::new(),
            authenticator,
            hooks: HookRunner::new(hooks),
            clients,
        }
    }

    /// Authentication mode of this server.
    #[must_use]
    pub fn auth_mode(&self) -> AuthMode {
        self.authenticator.mode()
    }

    /// Registered tools.
    #[must_use]
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Looks up a registered tool.
    fn tool(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|tool| tool.name() == name)
    }

    /// Handles one raw JSON-RPC payload.
    ///
    /// Returns `None` for notifications.
    pub async fn handle_payload(
        &self,
        context: RequestContext,
        bytes: &[u8],
        max_body_bytes: usize,
    ) -> Option<RpcReply> {
        if bytes.len() > max_body_bytes {
            return Some(oversized_reply());
        }
        let Ok(value) = serde_json::from_slice::<Value>(bytes) else {
            return Some(parse_error_reply());
        };
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => self.handle_request(context, request).await,
            Err(_) => {
                let failure = RpcFailure::new(
                    StatusCode::BAD_REQUEST,
                    INVALID_REQUEST,
                    "invalid json-rpc request",
                );
                Some(failure.into_reply(Value::Null))
            }
        }
    }

    /// Handles one decoded JSON-RPC request.
    ///
    /// Returns `None` for notifications.
    pub async fn handle_request(
        &self,
        context: RequestContext,
        request: JsonRpcRequest,
    ) -> Option<RpcReply> {
        if request.jsonrpc != JSONRPC_VERSION {
            let failure = RpcFailure::new(
                StatusCode::BAD_REQUEST,
                INVALID_REQUEST,
                "invalid json-rpc version",
            );
            return request.id.map(|id| failure.into_reply(id));
        }
        let method = McpMethod::from_name(&request.method);
        let call_id = request.id.as_ref().map(render_id).unwrap_or_default();
        let params = request.params.unwrap_or(Value::Null);
        self.hooks.run(HookPoint::BeforeAny, |hooks| {
            hooks.before_any(&context, method, &call_id, &params);
        });
        let (context, outcome) =
            self.dispatch(context, method, &request.method, &call_id, &params).await;
        match &outcome {
            Ok(result) => self.hooks.run(HookPoint::OnSuccess, |hooks| {
                hooks.on_success(&context, method, &call_id, result);
            }),
            Err(failure) => self.hooks.run(HookPoint::OnError, |hooks| {
                hooks.on_error(&context, method, &call_id, &failure.message);
            }),
        }
        let id = request.id?;
        Some(match outcome {
            Ok(result) => (StatusCode::OK, JsonRpcResponse::success(id, result)),
            Err(failure) => failure.into_reply(id),
        })
    }

    /// Routes a request to its method handler.
    ///
    /// Returns the context seen by the handler (authenticated when the method
    /// required it) with the outcome.
    async fn dispatch(
        &self,
        context: RequestContext,
        method: McpMethod,
        method_name: &str,
        call_id: &str,
        params: &Value,
    ) -> (RequestContext, Result<Value, RpcFailure>) {
        match method {
            McpMethod::Initialize => (context, Ok(self.initialize_result())),
            McpMethod::Initialized | McpMethod::Ping => (context, Ok(json!({}))),
            McpMethod::ToolsList => match self.authenticator.authenticate(context.clone()) {
                Ok(context) => (context, self.list_tools()),
                Err(err) => (context, Err(err.into())),
            },
            McpMethod::ToolsCall => match self.authenticator.authenticate(context.clone()) {
                Ok(context) => {
                    let outcome = self.call_tool(&context, call_id, params).await;
                    (context, outcome)
                }
                Err(err) => (context, Err(err.into())),
            },
            McpMethod::Other => {
                let failure = RpcFailure::new(
                    StatusCode::BAD_REQUEST,
                    METHOD_NOT_FOUND,
                    format!("method not found: {method_name}"),
                );
                (context, Err(failure))
            }
        }
    }

    /// Builds the `initialize` result.
    fn initialize_result(&self) -> Value {
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": { "name": self.info.name, "version": self.info.version },
        })
    }

    /// Builds the `tools/list` result.
    fn list_tools(&self) -> Result<Value, RpcFailure> {
        let result = ToolListResult {
            tools: self.tools.iter().map(Tool::definition).collect(),
        };
        serde_json::to_value(result).map_err(|_| serialization_failure())
    }

    /// Executes `tools/call` for an authenticated context.
    async fn call_tool(
        &self,
        context: &RequestContext,
        call_id: &str,
        params: &Value,
    ) -> Result<Value, RpcFailure> {
        let call = serde_json::from_value::<ToolCallParams>(params.clone())
            .map_err(|_| RpcFailure::invalid_params("invalid tool params"))?;
        let tool = self
            .tool(&call.name)
            .ok_or_else(|| RpcFailure::invalid_params(format!("unknown tool: {}", call.name)))?;
        let client = self.clients.resolve(context)?;
        self.hooks.run(HookPoint::BeforeCallTool, |hooks| {
            hooks.before_call_tool(context, call_id, params);
        });
        let tool_context = ToolContext::new(context.clone(), client);
        let result = match tool.handler().call(&tool_context, call.arguments).await {
            Ok(output) => ToolCallResult::success(&output),
            Err(err) => {
                tracing::warn!(tool = %call.name, error = %err, "tool call failed");
                ToolCallResult::failure(err.to_string())
            }
        };
        let value = serde_json::to_value(result).map_err(|_| serialization_failure())?;
        self.hooks.run(HookPoint::AfterCallTool, |hooks| {
            hooks.after_call_tool(context, call_id, params, &value);
        });
        Ok(value)
    }
}

impl ToolSink for McpServer {
    fn add_tools(&mut self, tools: Vec<Tool>) {
        for tool in tools {
            match self.tools.iter_mut().find(|existing| existing.name() == tool.name()) {
                Some(existing) => *existing = tool,
                None => self.tools.push(tool),
            }
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Renders a JSON-RPC id as hook-friendly text.
fn render_id(id: &Value) -> String {
    match id {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Reply for a payload over the size limit.
#[must_use]
pub fn oversized_reply() -> RpcReply {
    RpcFailure::new(StatusCode::PAYLOAD_TOO_LARGE, PAYLOAD_TOO_LARGE, "request body too large")
        .into_reply(Value::Null)
}

/// Reply for a payload that is not valid JSON text.
#[must_use]
pub fn parse_error_reply() -> RpcReply {
    RpcFailure::new(StatusCode::BAD_REQUEST, PARSE_ERROR, "parse error").into_reply(Value::Null)
}

/// Encodes a response as JSON text for stream transports.
#[must_use]
pub fn encode_response(response: &JsonRpcResponse) -> String {
    serde_json::to_string(response).unwrap_or_else(|_| {
        "{\"jsonrpc\":\"2.0\",\"id\":null,\"error\":{\"code\":-32603,\"message\":\"serialization \
         failed\"}}"
            .to_string()
    })
}

/// Failure for result serialization errors.
fn serialization_failure() -> RpcFailure {
    RpcFailure::new(StatusCode::OK, INTERNAL_ERROR, "serialization failed")
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
