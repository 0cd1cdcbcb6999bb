// crates/payments-mcp/src/lifecycle.rs
// ============================================================================
// Module: Server Lifecycle
// Description: Builds the server from configuration and runs a transport.
// Purpose: Coordinate startup, signal-driven cancellation, and bounded drain.
// Dependencies: payments-mcp-config, tokio, tokio-util, tracing
// ============================================================================

//! ## Overview
//! Startup is synchronous and fatal on failure: toolset admission, client
//! construction, and transport binding all complete before serving begins.
//! While serving, the orchestrator waits on exactly two events:
//!
//! - cancellation of its token (signal or parent), which triggers a graceful
//!   drain bounded by the configured deadline and returns `Ok(())`;
//! - the transport task finishing, whose result is returned as-is.
//!
//! The CLI maps `Ok(())` to exit code 0 and any error to exit code 1.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use payments_mcp_config::PaymentsMcpConfig;
use payments_mcp_config::ServerTransport;
use payments_mcp_config::ToolsetsConfig;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::ApiClients;
use crate::api::ApiError;
use crate::api::HttpPaymentApiFactory;
use crate::api::PaymentApiFactory;
use crate::auth::BearerCredentialAuth;
use crate::auth::TrustedLocalAuth;
use crate::catalog::default_toolset_group;
use crate::credential::Credential;
use crate::hooks::LoggingHooks;
use crate::hooks::McpHooks;
use crate::server::McpServer;
use crate::server::ServerInfo;
use crate::toolsets::ToolsetError;
use crate::toolsets::ToolsetGroup;
use crate::transport::NetworkTransport;
use crate::transport::StdioTransport;
use crate::transport::TransportError;

// ============================================================================
// SECTION: Construction
// ============================================================================

/// Builds the default catalogue and applies the configured admission.
///
/// # Errors
///
/// Returns [`ToolsetError::NotFound`] for the first unknown toolset name.
pub fn build_toolset_group(config: &ToolsetsConfig) -> Result<ToolsetGroup, ToolsetError> {
    let mut group = default_toolset_group(config.read_only);
    group.enable_toolsets(&config.enabled)?;
    Ok(group)
}

/// Builds a server for the configured transport with the group's tools.
///
/// Stdio binds one client to the configured credential; network transports
/// authenticate each call and build call-scoped clients.
///
/// # Errors
///
/// Returns [`LifecycleError::Config`] when stdio has no credential, or
/// [`LifecycleError::Api`] when the bound client cannot be built.
pub fn build_server(
    config: &PaymentsMcpConfig,
    group: &ToolsetGroup,
    factory: Arc<dyn PaymentApiFactory>,
    hooks: Arc<dyn McpHooks>,
) -> Result<McpServer, LifecycleError> {
    let mut server = match config.server.transport {
        ServerTransport::Stdio => {
            let Some((key, secret)) = config.credentials.pair() else {
                return Err(LifecycleError::Config(
                    "stdio transport requires credentials".to_string(),
                ));
            };
            let credential = Credential::new(key, secret);
            let clients = ApiClients::bound(factory, &credential)?;
            McpServer::new(
                ServerInfo::default(),
                Arc::new(TrustedLocalAuth::new(credential)),
                hooks,
                clients,
            )
        }
        ServerTransport::Http | ServerTransport::Sse => McpServer::new(
            ServerInfo::default(),
            Arc::new(BearerCredentialAuth),
            hooks,
            ApiClients::per_request(factory),
        ),
    };
    group.register_tools(&mut server);
    Ok(server)
}

// ============================================================================
// SECTION: Orchestration
// ============================================================================

/// Builds and serves the configured transport until cancellation.
///
/// # Errors
///
/// Returns [`LifecycleError`] on any construction failure or when the
/// transport fails while serving. Cancellation is not an error.
pub async fn run(
    config: &PaymentsMcpConfig,
    cancel: CancellationToken,
) -> Result<(), LifecycleError> {
    let factory = HttpPaymentApiFactory::from_config(&config.api)?;
    run_with(config, Arc::new(factory), Arc::new(LoggingHooks::tracing()), cancel).await
}

/// Like [`run`], with an explicit downstream client factory and hooks.
///
/// # Errors
///
/// Returns [`LifecycleError`] on any construction failure or when the
/// transport fails while serving.
pub async fn run_with(
    config: &PaymentsMcpConfig,
    factory: Arc<dyn PaymentApiFactory>,
    hooks: Arc<dyn McpHooks>,
    cancel: CancellationToken,
) -> Result<(), LifecycleError> {
    let group = build_toolset_group(&config.toolsets)?;
    let server = Arc::new(build_server(config, &group, factory, hooks)?);
    tracing::info!(
        transport = config.server.transport.as_str(),
        tools = server.tools().len(),
        read_only = group.is_read_only(),
        "server built"
    );
    let grace = config.server.shutdown_timeout();
    match config.server.transport {
        ServerTransport::Stdio => {
            let transport = StdioTransport::stdio(server, config.server.max_body_bytes)?;
            serve_until_cancelled(&cancel, grace, |shutdown| transport.serve(shutdown)).await
        }
        ServerTransport::Http => {
            let transport = NetworkTransport::http(server, &config.server).await?;
            serve_until_cancelled(&cancel, grace, |shutdown| transport.serve(shutdown)).await
        }
        ServerTransport::Sse => {
            let transport = NetworkTransport::sse(server, &config.server).await?;
            serve_until_cancelled(&cancel, grace, |shutdown| transport.serve(shutdown)).await
        }
    }
}

/// Runs `serve` on a background task until it finishes or `cancel` fires.
///
/// On cancellation the transport's shutdown token is cancelled and the task
/// gets `grace` to drain before it is aborted; the result is `Ok(())` either
/// way.
///
/// # Errors
///
/// Returns the transport's error when it stops on its own with one, or
/// [`LifecycleError::Join`] when the task ends without reporting.
pub async fn serve_until_cancelled<F, Fut>(
    cancel: &CancellationToken,
    grace: Duration,
    serve: F,
) -> Result<(), LifecycleError>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<(), TransportError>> + Send + 'static,
{
    let shutdown = CancellationToken::new();
    let (done_tx, done_rx) = oneshot::channel();
    let serving = serve(shutdown.clone());
    let mut task = tokio::spawn(async move {
        let _ = done_tx.send(serving.await);
    });
    tokio::select! {
        () = cancel.cancelled() => {
            tracing::info!(grace_ms = %grace.as_millis(), "shutdown requested");
            shutdown.cancel();
            if tokio::time::timeout(grace, &mut task).await.is_err() {
                tracing::warn!("graceful shutdown deadline elapsed; aborting transport");
                task.abort();
            }
            Ok(())
        }
        outcome = done_rx => match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                tracing::error!(error = %err, "transport stopped with an error");
                Err(err.into())
            }
            Err(_) => {
                Err(LifecycleError::Join("transport task ended without a result".to_string()))
            }
        },
    }
}

// ============================================================================
// SECTION: Signals
// ============================================================================

/// Signal subscription that stops listening when dropped.
pub struct SignalGuard {
    /// Task waiting for a signal.
    task: JoinHandle<()>,
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Cancels `cancel` on the first interrupt or termination signal.
///
/// Must be called from within a Tokio runtime.
#[must_use = "dropping the guard stops signal handling"]
pub fn cancel_on_signal(cancel: CancellationToken) -> SignalGuard {
    let task = tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("termination signal received");
        cancel.cancel();
    });
    SignalGuard {
        task,
    }
}

/// Waits for SIGINT or, on unix, SIGTERM.
async fn wait_for_signal() {
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "interrupt handler unavailable");
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::SignalKind;
        match tokio::signal::unix::signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "terminate handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();
    tokio::select! {
        () = interrupt => {}
        () = terminate => {}
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Lifecycle errors; every variant is fatal to the process.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Configuration cannot produce a server.
    #[error("configuration error: {0}")]
    Config(String),
    /// Toolset admission failed.
    #[error(transparent)]
    Toolset(#[from] ToolsetError),
    /// Downstream client construction failed.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// Transport construction or serving failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The transport task ended abnormally.
    #[error("transport task failed: {0}")]
    Join(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
