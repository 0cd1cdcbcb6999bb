// crates/payments-mcp/src/transport/network.rs
// ============================================================================
// Module: Network Transports
// Description: HTTP and SSE transports with health endpoints.
// Purpose: Serve per-request authenticated MCP clients over TCP.
// Dependencies: axum, tokio, tokio-stream, tokio-util, uuid
// ============================================================================

//! ## Overview
//! Both variants bind on construction and expose `GET /live` and
//! `GET /ready`, which answer `OK` unconditionally once bound.
//!
//! - HTTP: `POST /mcp` carries one JSON-RPC request and its response.
//! - SSE: `GET /sse` opens a session stream whose first `endpoint` event names
//!   the `POST /message?sessionId=<id>` URL. Responses to posted messages are
//!   delivered as `message` events on the session stream.
//!
//! Graceful shutdown closes every SSE stream so in-flight connections drain.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::response::sse::Event;
use axum::response::sse::KeepAlive;
use axum::response::sse::Sse;
use axum::routing::get;
use axum::routing::post;
use payments_mcp_config::ServerConfig;
use payments_mcp_config::ServerTransport;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use super::StateTracker;
use super::TransportError;
use super::TransportState;
use super::http_request_context;
use super::new_id;
use super::require_auth_mode;
use crate::auth::AuthMode;
use crate::server::McpServer;
use crate::server::RpcReply;
use crate::server::encode_response;
use crate::server::oversized_reply;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum concurrently open SSE sessions.
const MAX_SSE_SESSIONS: usize = 1024;
/// Buffered events per SSE session.
const SSE_SESSION_BUFFER: usize = 32;
/// Health endpoint body.
const HEALTH_BODY: &str = "OK";

// ============================================================================
// SECTION: Types
// ============================================================================

/// HTTP or SSE transport bound to a TCP listener.
pub struct NetworkTransport {
    /// Transport variant.
    transport: ServerTransport,
    /// Bound listener.
    listener: TcpListener,
    /// Route table.
    router: Router,
    /// Bound address.
    local_addr: SocketAddr,
    /// Lifecycle publisher.
    state: StateTracker,
    /// Open SSE sessions, when serving SSE.
    sessions: Option<Arc<SseSessions>>,
}

/// State shared by request handlers.
struct NetworkState {
    /// Dispatcher.
    server: Arc<McpServer>,
    /// Transport variant stamped on request contexts.
    transport: ServerTransport,
    /// Maximum accepted request body size.
    max_body_bytes: usize,
    /// Open SSE sessions.
    sessions: Arc<SseSessions>,
}

/// Open SSE session senders keyed by session id.
#[derive(Default)]
struct SseSessions {
    /// Session id to event sender.
    senders: Mutex<HashMap<String, mpsc::Sender<Event>>>,
}

impl SseSessions {
    /// Registers a session, unless the session limit is reached.
    fn open(&self) -> Option<(String, mpsc::Receiver<Event>)> {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        senders.retain(|_, sender| !sender.is_closed());
        if senders.len() >= MAX_SSE_SESSIONS {
            return None;
        }
        let (sender, receiver) = mpsc::channel(SSE_SESSION_BUFFER);
        let id = new_id();
        senders.insert(id.clone(), sender);
        Some((id, receiver))
    }

    /// Returns the sender for a live session.
    fn sender(&self, id: &str) -> Option<mpsc::Sender<Event>> {
        self.senders.lock().unwrap_or_else(PoisonError::into_inner).get(id).cloned()
    }

    /// Forgets a session.
    fn remove(&self, id: &str) {
        self.senders.lock().unwrap_or_else(PoisonError::into_inner).remove(id);
    }

    /// Drops every sender, ending all session streams.
    fn close_all(&self) {
        self.senders.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// Query string of `POST /message`.
#[derive(Debug, Deserialize)]
struct MessageQuery {
    /// Target session.
    #[serde(rename = "sessionId")]
    session_id: String,
}

// ============================================================================
// SECTION: Construction
// ============================================================================

impl NetworkTransport {
    /// Binds the HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::UnsupportedImplementation`] when the server
    /// does not use per-request authentication, or [`TransportError::Bind`]
    /// when the listener cannot be bound.
    pub async fn http(
        server: Arc<McpServer>,
        config: &ServerConfig,
    ) -> Result<Self, TransportError> {
        Self::bind(server, config, ServerTransport::Http).await
    }

    /// Binds the SSE transport.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::UnsupportedImplementation`] when the server
    /// does not use per-request authentication, or [`TransportError::Bind`]
    /// when the listener cannot be bound.
    pub async fn sse(
        server: Arc<McpServer>,
        config: &ServerConfig,
    ) -> Result<Self, TransportError> {
        Self::bind(server, config, ServerTransport::Sse).await
    }

    /// Checks the server, binds the listener, and builds the routes.
    async fn bind(
        server: Arc<McpServer>,
        config: &ServerConfig,
        transport: ServerTransport,
    ) -> Result<Self, TransportError> {
        require_auth_mode(&server, transport, AuthMode::PerRequest)?;
        let state = StateTracker::new(transport);
        let address = format!("{}:{}", config.address, config.port);
        let bind_error = |err: std::io::Error| TransportError::Bind {
            address: address.clone(),
            message: err.to_string(),
        };
        let listener =
            TcpListener::bind((config.address.as_str(), config.port)).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;
        let sessions = Arc::new(SseSessions::default());
        let shared = Arc::new(NetworkState {
            server,
            transport,
            max_body_bytes: config.max_body_bytes,
            sessions: Arc::clone(&sessions),
        });
        let routes = match transport {
            ServerTransport::Sse => {
                Router::new().route("/sse", get(open_sse)).route("/message", post(handle_message))
            }
            ServerTransport::Http | ServerTransport::Stdio => {
                Router::new().route("/mcp", post(handle_http))
            }
        };
        let router = routes
            .route("/live", get(health))
            .route("/ready", get(health))
            .with_state(shared);
        state.set(TransportState::Started);
        tracing::info!(transport = transport.as_str(), address = %local_addr, "listener bound");
        Ok(Self {
            transport,
            listener,
            router,
            local_addr,
            state,
            sessions: (transport == ServerTransport::Sse).then_some(sessions),
        })
    }

    /// Returns the bound address.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the transport variant.
    #[must_use]
    pub const fn transport(&self) -> ServerTransport {
        self.transport
    }

    /// Subscribes to lifecycle transitions.
    #[must_use]
    pub fn state(&self) -> watch::Receiver<TransportState> {
        self.state.subscribe()
    }

    /// Serves until `shutdown` fires, then drains open connections.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Serve`] when the listener fails.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<(), TransportError> {
        let Self { listener, router, state, sessions, .. } = self;
        state.set(TransportState::Serving);
        let drain_state = state.clone();
        let drained = async move {
            shutdown.cancelled().await;
            drain_state.set(TransportState::ShuttingDown);
            if let Some(sessions) = sessions {
                sessions.close_all();
            }
        };
        match axum::serve(listener, router).with_graceful_shutdown(drained).await {
            Ok(()) => {
                state.set(TransportState::Stopped);
                Ok(())
            }
            Err(err) => {
                state.set(TransportState::Failed);
                Err(TransportError::Serve(err.to_string()))
            }
        }
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Liveness and readiness probe.
async fn health() -> &'static str {
    HEALTH_BODY
}

/// Handles `POST /mcp`.
async fn handle_http(
    State(state): State<Arc<NetworkState>>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    match dispatch(&state, &headers, body).await {
        Some((status, response)) => (status, Json(response)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Handles `GET /sse`.
async fn open_sse(State(state): State<Arc<NetworkState>>) -> Response {
    let Some((session_id, receiver)) = state.sessions.open() else {
        tracing::warn!("sse session limit reached");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };
    tracing::debug!(session_id = %session_id, "sse session opened");
    Sse::new(session_stream(&session_id, receiver)).keep_alive(KeepAlive::default()).into_response()
}

/// Handles `POST /message`.
async fn handle_message(
    State(state): State<Arc<NetworkState>>,
    Query(query): Query<MessageQuery>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let Some(sender) = state.sessions.sender(&query.session_id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some((status, response)) = dispatch(&state, &headers, body).await else {
        return StatusCode::ACCEPTED.into_response();
    };
    if status != StatusCode::OK {
        return (status, Json(response)).into_response();
    }
    let event = Event::default().event("message").data(encode_response(&response));
    if sender.send(event).await.is_err() {
        state.sessions.remove(&query.session_id);
        return StatusCode::NOT_FOUND.into_response();
    }
    StatusCode::ACCEPTED.into_response()
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads the bounded body and dispatches it.
async fn dispatch(state: &NetworkState, headers: &HeaderMap, body: Body) -> Option<RpcReply> {
    let Ok(bytes) = axum::body::to_bytes(body, state.max_body_bytes).await else {
        return Some(oversized_reply());
    };
    let context = http_request_context(state.transport, headers);
    state.server.handle_payload(context, &bytes, state.max_body_bytes).await
}

/// Endpoint event followed by the session's message events.
fn session_stream(
    session_id: &str,
    receiver: mpsc::Receiver<Event>,
) -> impl Stream<Item = Result<Event, Infallible>> + use<> {
    let endpoint =
        Event::default().event("endpoint").data(format!("/message?sessionId={session_id}"));
    tokio_stream::once(endpoint).chain(ReceiverStream::new(receiver)).map(Ok::<_, Infallible>)
}
