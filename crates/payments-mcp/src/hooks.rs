// crates/payments-mcp/src/hooks.rs
// ============================================================================
// Module: Instrumentation Hooks
// Description: Observation points around every MCP call.
// Purpose: Emit structured call records without affecting call outcomes.
// Dependencies: serde, serde_json, tracing
// ============================================================================

//! ## Overview
//! The server invokes [`McpHooks`] at five points: before any method, on
//! success, on error, and around tool calls. [`LoggingHooks`] turns each point
//! into a [`HookRecord`] and hands it to an [`EventSink`]; the default sink
//! writes through `tracing`.
//!
//! ## Invariants
//! - Hooks observe only. [`HookRunner`] contains hook panics so a failing
//!   hook never changes a call's outcome.
//! - `tools/list` success payloads are reduced to tool names.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use tracing::Level;

use crate::context::RequestContext;

// ============================================================================
// SECTION: Labels
// ============================================================================

/// MCP method classification.
///
/// # Invariants
/// - Variants are stable for log labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum McpMethod {
    /// JSON-RPC initialize.
    Initialize,
    /// `notifications/initialized` notification.
    Initialized,
    /// JSON-RPC ping.
    Ping,
    /// JSON-RPC tools/list.
    ToolsList,
    /// JSON-RPC tools/call.
    ToolsCall,
    /// Unsupported method.
    Other,
}

impl McpMethod {
    /// Classifies a JSON-RPC method name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "initialize" => Self::Initialize,
            "notifications/initialized" => Self::Initialized,
            "ping" => Self::Ping,
            "tools/list" => Self::ToolsList,
            "tools/call" => Self::ToolsCall,
            _ => Self::Other,
        }
    }

    /// Returns a stable label for the method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Initialized => "notifications/initialized",
            Self::Ping => "ping",
            Self::ToolsList => "tools/list",
            Self::ToolsCall => "tools/call",
            Self::Other => "other",
        }
    }
}

/// Hook invocation point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPoint {
    /// Before any method is dispatched.
    BeforeAny,
    /// After a method succeeds.
    OnSuccess,
    /// After a method fails.
    OnError,
    /// Before a tool handler runs.
    BeforeCallTool,
    /// After a tool handler returns.
    AfterCallTool,
}

impl HookPoint {
    /// Returns a stable label for the hook point.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BeforeAny => "before_any",
            Self::OnSuccess => "on_success",
            Self::OnError => "on_error",
            Self::BeforeCallTool => "before_call_tool",
            Self::AfterCallTool => "after_call_tool",
        }
    }
}

// ============================================================================
// SECTION: Hook Trait
// ============================================================================

/// Observation points around MCP calls.
///
/// `call_id` is the JSON-RPC request id rendered as text (empty for
/// notifications).
pub trait McpHooks: Send + Sync {
    /// Called before any method is dispatched.
    fn before_any(
        &self,
        context: &RequestContext,
        method: McpMethod,
        call_id: &str,
        params: &Value,
    );
    /// Called after a method succeeds.
    fn on_success(
        &self,
        context: &RequestContext,
        method: McpMethod,
        call_id: &str,
        result: &Value,
    );
    /// Called after a method fails.
    fn on_error(&self, context: &RequestContext, method: McpMethod, call_id: &str, error: &str);
    /// Called before a tool handler runs.
    fn before_call_tool(&self, context: &RequestContext, call_id: &str, params: &Value);
    /// Called after a tool handler returns.
    fn after_call_tool(
        &self,
        context: &RequestContext,
        call_id: &str,
        params: &Value,
        result: &Value,
    );
}

/// Hooks that ignore every call.
pub struct NoopHooks;

impl McpHooks for NoopHooks {
    fn before_any(&self, _: &RequestContext, _: McpMethod, _: &str, _: &Value) {}

    fn on_success(&self, _: &RequestContext, _: McpMethod, _: &str, _: &Value) {}

    fn on_error(&self, _: &RequestContext, _: McpMethod, _: &str, _: &str) {}

    fn before_call_tool(&self, _: &RequestContext, _: &str, _: &Value) {}

    fn after_call_tool(&self, _: &RequestContext, _: &str, _: &Value, _: &Value) {}
}

// ============================================================================
// SECTION: Event Sink
// ============================================================================

/// Structured record emitted by [`LoggingHooks`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HookRecord {
    /// Hook point that produced the record.
    pub hook: HookPoint,
    /// Method label.
    pub method: &'static str,
    /// JSON-RPC request id rendered as text.
    pub call_id: String,
    /// Hook payload (params, result, or error message).
    pub payload: Value,
}

/// Destination for hook records.
pub trait EventSink: Send + Sync {
    /// Emits one record at `level`.
    fn emit(&self, level: Level, context: &RequestContext, record: &HookRecord);
}

/// Event sink writing records through `tracing`.
pub struct TracingEventSink;

/// Emits one hook record at a fixed `tracing` level.
macro_rules! emit_record {
    ($level:expr, $context:expr, $record:expr, $payload:expr) => {
        tracing::event!(
            $level,
            hook = $record.hook.as_str(),
            method = $record.method,
            call_id = %$record.call_id,
            transport = $context.transport().as_str(),
            request_id = $context.request_id().unwrap_or_default(),
            task_id = $context.task_id().unwrap_or_default(),
            merchant_id = $context.merchant_id().unwrap_or_default(),
            payload = %$payload,
            "mcp hook"
        )
    };
}

impl EventSink for TracingEventSink {
    fn emit(&self, level: Level, context: &RequestContext, record: &HookRecord) {
        let payload = record.payload.to_string();
        if level == Level::ERROR {
            emit_record!(Level::ERROR, context, record, payload);
        } else if level == Level::WARN {
            emit_record!(Level::WARN, context, record, payload);
        } else if level == Level::INFO {
            emit_record!(Level::INFO, context, record, payload);
        } else {
            emit_record!(Level::DEBUG, context, record, payload);
        }
    }
}

/// Event sink that discards records.
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _level: Level, _context: &RequestContext, _record: &HookRecord) {}
}

// ============================================================================
// SECTION: Logging Hooks
// ============================================================================

/// Hooks that emit one record per invocation point.
pub struct LoggingHooks {
    /// Record destination.
    sink: Arc<dyn EventSink>,
}

impl LoggingHooks {
    /// Builds logging hooks writing to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
        }
    }

    /// Builds logging hooks writing through `tracing`.
    #[must_use]
    pub fn tracing() -> Self {
        Self::new(Arc::new(TracingEventSink))
    }

    /// Emits a record.
    fn emit(
        &self,
        level: Level,
        context: &RequestContext,
        hook: HookPoint,
        method: McpMethod,
        call_id: &str,
        payload: Value,
    ) {
        let record = HookRecord {
            hook,
            method: method.as_str(),
            call_id: call_id.to_string(),
            payload,
        };
        self.sink.emit(level, context, &record);
    }
}

impl McpHooks for LoggingHooks {
    fn before_any(
        &self,
        context: &RequestContext,
        method: McpMethod,
        call_id: &str,
        params: &Value,
    ) {
        self.emit(Level::INFO, context, HookPoint::BeforeAny, method, call_id, params.clone());
    }

    fn on_success(
        &self,
        context: &RequestContext,
        method: McpMethod,
        call_id: &str,
        result: &Value,
    ) {
        let payload = match method {
            McpMethod::ToolsList => summarize_tool_list(result),
            _ => result.clone(),
        };
        self.emit(Level::INFO, context, HookPoint::OnSuccess, method, call_id, payload);
    }

    fn on_error(&self, context: &RequestContext, method: McpMethod, call_id: &str, error: &str) {
        let payload = json!({ "error": error });
        self.emit(Level::ERROR, context, HookPoint::OnError, method, call_id, payload);
    }

    fn before_call_tool(&self, context: &RequestContext, call_id: &str, params: &Value) {
        let point = HookPoint::BeforeCallTool;
        self.emit(Level::INFO, context, point, McpMethod::ToolsCall, call_id, params.clone());
    }

    fn after_call_tool(
        &self,
        context: &RequestContext,
        call_id: &str,
        params: &Value,
        result: &Value,
    ) {
        let payload = json!({ "params": params, "result": result });
        let point = HookPoint::AfterCallTool;
        self.emit(Level::INFO, context, point, McpMethod::ToolsCall, call_id, payload);
    }
}

/// Reduces a `tools/list` result to the advertised tool names.
#[must_use]
pub fn summarize_tool_list(result: &Value) -> Value {
    let names: Vec<Value> = result
        .get("tools")
        .and_then(Value::as_array)
        .map(|tools| tools.iter().filter_map(|tool| tool.get("name").cloned()).collect())
        .unwrap_or_default();
    json!({ "tools": names })
}

// ============================================================================
// SECTION: Hook Runner
// ============================================================================

/// Invokes hooks with panic isolation.
#[derive(Clone)]
pub struct HookRunner {
    /// Hooks being invoked.
    hooks: Arc<dyn McpHooks>,
}

impl HookRunner {
    /// Wraps `hooks` for isolated invocation.
    #[must_use]
    pub fn new(hooks: Arc<dyn McpHooks>) -> Self {
        Self {
            hooks,
        }
    }

    /// Runs one hook invocation, logging and discarding any panic.
    pub fn run(&self, point: HookPoint, invoke: impl FnOnce(&dyn McpHooks)) {
        let hooks = self.hooks.as_ref();
        if catch_unwind(AssertUnwindSafe(|| invoke(hooks))).is_err() {
            tracing::warn!(hook = point.as_str(), "instrumentation hook panicked; call continues");
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
