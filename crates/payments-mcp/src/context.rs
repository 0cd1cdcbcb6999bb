// crates/payments-mcp/src/context.rs
// ============================================================================
// Module: Request Context
// Description: Typed per-call carrier for caller identity and correlation ids.
// Purpose: Thread call-scoped state through auth, hooks, and tool handlers.
// Dependencies: payments-mcp-config
// ============================================================================

//! ## Overview
//! Every inbound call gets a fresh [`RequestContext`] from its transport. The
//! authentication step derives an enriched copy; handlers and instrumentation
//! hooks only read it. Contexts are owned by exactly one call and are never
//! shared across calls.
//!
//! ## Invariants
//! - Fields are only set through `with_*` builders, which return a new value.
//! - A derived [`Credential`] is present only after successful per-request
//!   authentication.

use payments_mcp_config::ServerTransport;

use crate::credential::Credential;

/// Per-call context used by auth, hooks, and tool handlers.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Transport that received the call.
    transport: ServerTransport,
    /// Raw bearer token pulled from the `Authorization` header.
    auth_token: Option<String>,
    /// Credential derived from the bearer token.
    credential: Option<Credential>,
    /// Server-generated request identifier.
    request_id: Option<String>,
    /// Caller-supplied or generated task identifier.
    task_id: Option<String>,
    /// Merchant identifier asserted by the caller.
    merchant_id: Option<String>,
}

impl RequestContext {
    /// Builds an empty context for the given transport.
    #[must_use]
    pub const fn new(transport: ServerTransport) -> Self {
        Self {
            transport,
            auth_token: None,
            credential: None,
            request_id: None,
            task_id: None,
            merchant_id: None,
        }
    }

    /// Builds a stdio request context.
    #[must_use]
    pub const fn stdio() -> Self {
        Self::new(ServerTransport::Stdio)
    }

    /// Returns a copy with the raw bearer token set.
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Returns a copy carrying the derived credential.
    #[must_use]
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Returns a copy with the request identifier set.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Returns a copy with the task identifier set.
    #[must_use]
    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    /// Returns a copy with the merchant identifier set.
    #[must_use]
    pub fn with_merchant_id(mut self, merchant_id: impl Into<String>) -> Self {
        self.merchant_id = Some(merchant_id.into());
        self
    }

    /// Transport that received the call.
    #[must_use]
    pub const fn transport(&self) -> ServerTransport {
        self.transport
    }

    /// Raw bearer token, if the transport extracted one.
    #[must_use]
    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    /// Credential derived by per-request authentication.
    #[must_use]
    pub const fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Request identifier.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Task identifier.
    #[must_use]
    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    /// Merchant identifier.
    #[must_use]
    pub fn merchant_id(&self) -> Option<&str> {
        self.merchant_id.as_deref()
    }
}
