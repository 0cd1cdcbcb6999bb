// crates/payments-mcp-config/src/lib.rs
// ============================================================================
// Module: Payments MCP Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for payments-mcp.toml semantics.
// Dependencies: serde, toml, url
// ============================================================================

//! ## Overview
//! `payments-mcp-config` defines the canonical configuration model for the
//! Payments MCP server. It provides strict, fail-closed validation so a
//! misconfigured deployment never starts serving.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
