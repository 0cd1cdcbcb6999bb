// crates/payments-mcp-cli/src/main.rs
// ============================================================================
// Module: Payments MCP CLI Entry Point
// Description: Command-line launcher for the payments MCP server.
// Purpose: Load configuration, install logging, and run one transport.
// Dependencies: clap, payments-mcp, payments-mcp-config, tokio, tracing
// ============================================================================

//! ## Overview
//! `payments-mcp <stdio|http|sse>` loads configuration (file, environment,
//! then flags), installs tracing on stderr, and serves until interrupted.
//! Exit code 0 means a graceful stop; any startup or serving failure exits
//! with 1.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod logging;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use payments_mcp_config::LogFormat;
use payments_mcp_config::PaymentsMcpConfig;
use payments_mcp_config::ServerTransport;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Time allowed for blocking runtime work (the stdin reader) after serving ends.
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "payments-mcp", version, about = "MCP server for the payments API")]
struct Cli {
    /// Config file path (defaults to `PAYMENTS_MCP_CONFIG` or payments-mcp.toml).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Comma-separated toolsets to enable (all when omitted in config and flags).
    #[arg(long, value_name = "NAMES", value_delimiter = ',', global = true)]
    toolsets: Option<Vec<String>>,
    /// Suppress every write tool.
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    read_only: bool,
    /// Log output format.
    #[arg(long, value_enum, value_name = "FORMAT", global = true)]
    log_format: Option<LogFormatArg>,
    /// Log filter directives, for example `info,payments_mcp=debug`.
    #[arg(long, value_name = "FILTER", global = true)]
    log_filter: Option<String>,
    /// Transport to serve.
    #[command(subcommand)]
    command: Commands,
}

/// Transport subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve one trusted local client over stdin and stdout.
    Stdio,
    /// Serve JSON-RPC over HTTP with per-request bearer credentials.
    Http(NetworkArgs),
    /// Serve MCP over server-sent events with per-request bearer credentials.
    Sse(NetworkArgs),
}

/// Bind overrides for network transports.
#[derive(Args, Debug)]
struct NetworkArgs {
    /// Bind address.
    #[arg(long, value_name = "ADDR")]
    address: Option<String>,
    /// Bind port.
    #[arg(long, value_name = "PORT")]
    port: Option<u16>,
}

/// Log format flag values.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormatArg {
    /// Multi-line human-readable output.
    Pretty,
    /// Single-line output.
    Compact,
    /// One JSON object per line.
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Pretty => Self::Pretty,
            LogFormatArg::Compact => Self::Compact,
            LogFormatArg::Json => Self::Json,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    let cli = Cli::parse();
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => return emit_error(&format!("failed to start runtime: {err}")),
    };
    let code = runtime.block_on(async {
        match run(cli).await {
            Ok(code) => code,
            Err(err) => emit_error(&err.to_string()),
        }
    });
    // A pending stdin read would otherwise hold the runtime open.
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
    code
}

/// Loads configuration and serves until interrupted.
async fn run(cli: Cli) -> CliResult<ExitCode> {
    let config = load_config(&cli)?;
    logging::init(&config.logging).map_err(CliError::new)?;
    let cancel = CancellationToken::new();
    let _signals = payments_mcp::cancel_on_signal(cancel.clone());
    if let Err(err) = payments_mcp::run(&config, cancel).await {
        tracing::error!(error = %err, "server failed");
        return Err(CliError::new(format!("server failed: {err}")));
    }
    tracing::info!("server stopped");
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Reads configuration, layers flag overrides, then validates.
fn load_config(cli: &Cli) -> CliResult<PaymentsMcpConfig> {
    let mut config = PaymentsMcpConfig::read(cli.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    apply_overrides(&mut config, cli);
    config.validate().map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    Ok(config)
}

/// Applies subcommand and flag overrides to loaded configuration.
fn apply_overrides(config: &mut PaymentsMcpConfig, cli: &Cli) {
    let network = match &cli.command {
        Commands::Stdio => {
            config.server.transport = ServerTransport::Stdio;
            None
        }
        Commands::Http(args) => {
            config.server.transport = ServerTransport::Http;
            Some(args)
        }
        Commands::Sse(args) => {
            config.server.transport = ServerTransport::Sse;
            Some(args)
        }
    };
    if let Some(args) = network {
        if let Some(address) = &args.address {
            config.server.address.clone_from(address);
        }
        if let Some(port) = args.port {
            config.server.port = port;
        }
    }
    if let Some(toolsets) = &cli.toolsets {
        config.toolsets.enabled.clone_from(toolsets);
    }
    if cli.read_only {
        config.toolsets.read_only = true;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format.into();
    }
    if let Some(filter) = &cli.log_filter {
        config.logging.filter.clone_from(filter);
    }
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
