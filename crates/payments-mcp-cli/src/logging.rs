// crates/payments-mcp-cli/src/logging.rs
// ============================================================================
// Module: CLI Logging
// Description: Tracing subscriber installation for the server binary.
// Purpose: Route structured logs to stderr in the configured format.
// Dependencies: payments-mcp-config, tracing-subscriber
// ============================================================================

//! ## Overview
//! Logs always go to stderr; stdout belongs to the stdio transport. The
//! `RUST_LOG` environment variable takes precedence over the configured
//! filter.

// ============================================================================
// SECTION: Imports
// ============================================================================

use payments_mcp_config::LogFormat;
use payments_mcp_config::LoggingConfig;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Initialization
// ============================================================================

/// Resolves the active filter directives.
///
/// # Errors
///
/// Returns a message when the configured directives do not parse.
pub(crate) fn resolve_filter(config: &LoggingConfig) -> Result<EnvFilter, String> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.filter)
        .map_err(|err| format!("invalid logging filter {}: {err}", config.filter))
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns a message when the filter is invalid or a subscriber is already
/// installed.
pub(crate) fn init(config: &LoggingConfig) -> Result<(), String> {
    let filter = resolve_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    let installed = match config.format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
    };
    installed.map_err(|err| format!("failed to install logger: {err}"))
}
