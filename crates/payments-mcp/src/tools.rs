// crates/payments-mcp/src/tools.rs
// ============================================================================
// Module: Tool Definitions
// Description: Tool descriptors, parameter schemas, and handler trait.
// Purpose: Describe callable MCP tools independently of any transport.
// Dependencies: async-trait, serde, serde_json
// ============================================================================

//! ## Overview
//! A [`Tool`] pairs an MCP-visible descriptor (name, description, parameter
//! schema) with a [`ToolHandler`]. Handlers receive a [`ToolContext`] holding
//! the authenticated request context and the downstream client resolved for
//! this call.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::api::ApiError;
use crate::api::PaymentApi;
use crate::context::RequestContext;

// ============================================================================
// SECTION: Parameters
// ============================================================================

/// JSON type accepted by a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// JSON string.
    String,
    /// JSON integer.
    Integer,
    /// Any JSON number.
    Number,
    /// JSON boolean.
    Boolean,
    /// JSON object.
    Object,
    /// JSON array.
    Array,
}

impl ParameterKind {
    /// Returns the JSON Schema type name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    /// Returns true when `value` has this JSON type.
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

/// Declared tool parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolParameter {
    /// Parameter name as it appears in call arguments.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Accepted JSON type.
    pub kind: ParameterKind,
    /// Whether the caller must supply the parameter.
    pub required: bool,
}

impl ToolParameter {
    /// Builds a required parameter.
    #[must_use]
    pub fn required(name: &str, kind: ParameterKind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind,
            required: true,
        }
    }

    /// Builds an optional parameter.
    #[must_use]
    pub fn optional(name: &str, kind: ParameterKind, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }
}

// ============================================================================
// SECTION: Tools
// ============================================================================

/// Executes a tool call.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Runs the tool with decoded call arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] when arguments are invalid or the downstream
    /// call fails. Errors are reported to the caller as tool results.
    async fn call(&self, context: &ToolContext, arguments: Value) -> Result<Value, ToolError>;
}

/// Callable MCP tool.
#[derive(Clone)]
pub struct Tool {
    /// Tool name advertised to clients.
    name: String,
    /// Tool description advertised to clients.
    description: String,
    /// Declared parameters.
    parameters: Vec<ToolParameter>,
    /// Handler invoked on `tools/call`.
    handler: Arc<dyn ToolHandler>,
}

impl Tool {
    /// Builds a tool from its descriptor and handler.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Vec<ToolParameter>,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler,
        }
    }

    /// Tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tool description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Declared parameters.
    #[must_use]
    pub fn parameters(&self) -> &[ToolParameter] {
        &self.parameters
    }

    /// Tool handler.
    #[must_use]
    pub fn handler(&self) -> &Arc<dyn ToolHandler> {
        &self.handler
    }

    /// Builds the JSON Schema describing the tool's arguments.
    #[must_use]
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for parameter in &self.parameters {
            properties.insert(
                parameter.name.clone(),
                json!({
                    "type": parameter.kind.as_str(),
                    "description": parameter.description,
                }),
            );
            if parameter.required {
                required.push(Value::String(parameter.name.clone()));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Builds the `tools/list` entry for this tool.
    #[must_use]
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema(),
        }
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("parameters", &self.parameters.len())
            .finish_non_exhaustive()
    }
}

/// Tool entry returned by `tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// Tool description.
    pub description: String,
    /// JSON Schema for call arguments.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Per-call state handed to tool handlers.
#[derive(Clone)]
pub struct ToolContext {
    /// Authenticated request context.
    request: RequestContext,
    /// Downstream client resolved for this call.
    client: Arc<dyn PaymentApi>,
}

impl ToolContext {
    /// Builds a tool context.
    #[must_use]
    pub fn new(request: RequestContext, client: Arc<dyn PaymentApi>) -> Self {
        Self {
            request,
            client,
        }
    }

    /// Authenticated request context.
    #[must_use]
    pub const fn request(&self) -> &RequestContext {
        &self.request
    }

    /// Downstream client for this call.
    #[must_use]
    pub fn client(&self) -> &dyn PaymentApi {
        self.client.as_ref()
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Tool execution errors, surfaced to callers as `isError` tool results.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Call arguments failed validation.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
    /// Downstream payment API failure.
    #[error(transparent)]
    Api(#[from] ApiError),
}
