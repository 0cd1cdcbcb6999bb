// crates/payments-mcp/src/lib.rs
// ============================================================================
// Module: Payments MCP
// Description: MCP server core exposing a payment API as tools.
// Purpose: Admission control, authentication, hooks, and transports.
// Dependencies: payments-mcp-config, axum, reqwest, tokio
// ============================================================================

//! ## Overview
//! Payments MCP exposes a downstream payment API to MCP clients as a
//! catalogue of tools grouped into toolsets. Deployments choose which
//! toolsets are admitted and whether write tools are suppressed.
//!
//! Two trust levels are supported:
//! - stdio serves one trusted local client with a credential bound at startup;
//! - HTTP and SSE authenticate every call from its bearer token and talk to
//!   the payment API with that call's credential.
//!
//! Security posture: every network payload and header is untrusted input.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod api;
pub mod auth;
pub mod catalog;
pub mod context;
pub mod credential;
pub mod hooks;
pub mod lifecycle;
pub mod server;
pub mod tools;
pub mod toolsets;
pub mod transport;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use api::ApiClients;
pub use api::ApiError;
pub use api::HttpPaymentApiFactory;
pub use api::PaymentApi;
pub use api::PaymentApiFactory;
pub use auth::AuthError;
pub use auth::AuthMode;
pub use auth::Authenticator;
pub use auth::BearerCredentialAuth;
pub use auth::TrustedLocalAuth;
pub use catalog::default_toolset_group;
pub use context::RequestContext;
pub use credential::Credential;
pub use hooks::LoggingHooks;
pub use hooks::McpHooks;
pub use hooks::McpMethod;
pub use hooks::NoopHooks;
pub use lifecycle::LifecycleError;
pub use lifecycle::cancel_on_signal;
pub use lifecycle::run;
pub use server::McpServer;
pub use server::ServerInfo;
pub use tools::Tool;
pub use tools::ToolHandler;
pub use toolsets::ToolSink;
pub use toolsets::Toolset;
pub use toolsets::ToolsetError;
pub use toolsets::ToolsetGroup;
pub use transport::NetworkTransport;
pub use transport::StdioTransport;
pub use transport::TransportError;
pub use transport::TransportState;
