// crates/payments-mcp/src/transport.rs
// ============================================================================
// Module: MCP Transports
// Description: Shared transport state, errors, and request context extraction.
// Purpose: Host the stdio, HTTP, and SSE transport servers.
// Dependencies: axum, tokio, uuid
// ============================================================================

//! ## Overview
//! Every transport walks the same lifecycle, published on a `watch` channel:
//! `Created -> Started -> Serving -> ShuttingDown -> Stopped`, with `Failed`
//! on a runtime error. Transport constructors check that the server's
//! authentication mode fits the transport's trust level:
//!
//! - [`StdioTransport`] requires trusted-local authentication.
//! - [`NetworkTransport`] (HTTP and SSE) requires per-request authentication.
//!
//! Cancellation is never an error: `serve` returns `Ok(())` once its shutdown
//! token fires.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use payments_mcp_config::ServerTransport;
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

use crate::auth::AuthMode;
use crate::auth::extract_bearer_token;
use crate::context::RequestContext;
use crate::server::McpServer;

mod network;
mod stdio;

pub use network::NetworkTransport;
pub use stdio::StdioTransport;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying a caller-supplied task id.
pub const TASK_ID_HEADER: &str = "x-task-id";
/// Header carrying a caller-asserted merchant id.
pub const MERCHANT_ID_HEADER: &str = "x-merchant-id";

// ============================================================================
// SECTION: Lifecycle State
// ============================================================================

/// Transport lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Constructed, not yet started.
    Created,
    /// Listener bound or read loop starting.
    Started,
    /// Accepting calls.
    Serving,
    /// Draining after cancellation.
    ShuttingDown,
    /// Stopped cleanly.
    Stopped,
    /// Stopped on a runtime error.
    Failed,
}

impl TransportState {
    /// Returns a stable label for the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Started => "started",
            Self::Serving => "serving",
            Self::ShuttingDown => "shutting_down",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

/// Publishes transport state transitions.
#[derive(Clone)]
pub(crate) struct StateTracker {
    /// Transport whose state is tracked.
    transport: ServerTransport,
    /// State channel sender.
    sender: Arc<watch::Sender<TransportState>>,
}

impl StateTracker {
    /// Builds a tracker in the `Created` state.
    pub(crate) fn new(transport: ServerTransport) -> Self {
        let (sender, _) = watch::channel(TransportState::Created);
        Self {
            transport,
            sender: Arc::new(sender),
        }
    }

    /// Records a transition.
    pub(crate) fn set(&self, state: TransportState) {
        let previous = self.sender.send_replace(state);
        tracing::info!(
            transport = self.transport.as_str(),
            from = previous.as_str(),
            to = state.as_str(),
            "transport state changed"
        );
    }

    /// Subscribes to state transitions.
    pub(crate) fn subscribe(&self) -> watch::Receiver<TransportState> {
        self.sender.subscribe()
    }
}

// ============================================================================
// SECTION: Request Context
// ============================================================================

/// Builds the context for a network call from its headers.
///
/// Never fails. The bearer token is attached when present; authentication
/// decides later whether the call may proceed.
#[must_use]
pub fn http_request_context(transport: ServerTransport, headers: &HeaderMap) -> RequestContext {
    let auth_header = headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok());
    let task_id = header_text(headers, TASK_ID_HEADER).unwrap_or_else(new_id);
    let mut context =
        RequestContext::new(transport).with_request_id(new_id()).with_task_id(task_id);
    if let Some(token) = extract_bearer_token(auth_header) {
        context = context.with_auth_token(token);
    }
    if let Some(merchant_id) = header_text(headers, MERCHANT_ID_HEADER) {
        context = context.with_merchant_id(merchant_id);
    }
    context
}

/// Builds the context for a stdio call.
#[must_use]
pub fn stdio_request_context() -> RequestContext {
    RequestContext::stdio().with_request_id(new_id()).with_task_id(new_id())
}

/// Returns a non-empty header value as text.
fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Generates a fresh identifier.
fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// ============================================================================
// SECTION: Construction Checks
// ============================================================================

/// Fails unless `server` authenticates the way `transport` requires.
fn require_auth_mode(
    server: &McpServer,
    transport: ServerTransport,
    expected: AuthMode,
) -> Result<(), TransportError> {
    let actual = server.auth_mode();
    if actual == expected {
        return Ok(());
    }
    Err(TransportError::UnsupportedImplementation {
        transport,
        reason: format!(
            "requires {} authentication, server uses {}",
            expected.as_str(),
            actual.as_str()
        ),
    })
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server cannot be served by this transport.
    #[error("{transport} transport cannot serve this server: {reason}")]
    UnsupportedImplementation {
        /// Transport being constructed.
        transport: ServerTransport,
        /// Mismatch description.
        reason: String,
    },
    /// The listener could not be bound.
    #[error("failed to bind {address}: {message}")]
    Bind {
        /// Requested bind address.
        address: String,
        /// Bind failure detail.
        message: String,
    },
    /// Stream read or write failure.
    #[error("transport io error: {0}")]
    Io(String),
    /// Listener failure after start.
    #[error("transport serve error: {0}")]
    Serve(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
