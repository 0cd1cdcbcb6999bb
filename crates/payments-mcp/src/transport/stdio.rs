// crates/payments-mcp/src/transport/stdio.rs
// ============================================================================
// Module: Stdio Transport
// Description: Newline-delimited JSON-RPC over a byte stream pair.
// Purpose: Serve a trusted local client over stdin and stdout.
// Dependencies: tokio, tokio-util
// ============================================================================

//! ## Overview
//! One JSON-RPC message per line. Lines longer than the body limit are
//! discarded up to the next newline and answered with a payload-too-large
//! error; blank lines are ignored. End of input stops the transport cleanly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use payments_mcp_config::ServerTransport;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::io::Stdin;
use tokio::io::Stdout;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::StateTracker;
use super::TransportError;
use super::TransportState;
use super::require_auth_mode;
use super::stdio_request_context;
use crate::auth::AuthMode;
use crate::server::McpServer;
use crate::server::RpcReply;
use crate::server::encode_response;
use crate::server::oversized_reply;

// ============================================================================
// SECTION: Types
// ============================================================================

/// One framed input line.
enum Line {
    /// Line content without the trailing newline.
    Text(Vec<u8>),
    /// Line exceeded the limit and was discarded.
    TooLong,
    /// Input exhausted.
    Eof,
}

/// Stdio transport over any reader and writer pair.
pub struct StdioTransport<R, W> {
    /// Dispatcher.
    server: Arc<McpServer>,
    /// Buffered input.
    reader: BufReader<R>,
    /// Reply sink.
    writer: W,
    /// Maximum accepted line length in bytes, excluding the newline.
    max_line_bytes: usize,
    /// Lifecycle publisher.
    state: StateTracker,
}

impl StdioTransport<Stdin, Stdout> {
    /// Builds a transport over the process stdin and stdout.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::UnsupportedImplementation`] when the server
    /// does not use trusted-local authentication.
    pub fn stdio(server: Arc<McpServer>, max_line_bytes: usize) -> Result<Self, TransportError> {
        Self::new(server, tokio::io::stdin(), tokio::io::stdout(), max_line_bytes)
    }
}

impl<R, W> StdioTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Builds a transport over the given streams.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::UnsupportedImplementation`] when the server
    /// does not use trusted-local authentication.
    pub fn new(
        server: Arc<McpServer>,
        reader: R,
        writer: W,
        max_line_bytes: usize,
    ) -> Result<Self, TransportError> {
        require_auth_mode(&server, ServerTransport::Stdio, AuthMode::TrustedLocal)?;
        Ok(Self {
            server,
            reader: BufReader::new(reader),
            writer,
            max_line_bytes,
            state: StateTracker::new(ServerTransport::Stdio),
        })
    }

    /// Subscribes to lifecycle transitions.
    #[must_use]
    pub fn state(&self) -> watch::Receiver<TransportState> {
        self.state.subscribe()
    }

    /// Serves lines until end of input or cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] when reading or writing fails.
    pub async fn serve(mut self, shutdown: CancellationToken) -> Result<(), TransportError> {
        self.state.set(TransportState::Started);
        self.state.set(TransportState::Serving);
        loop {
            let outcome = tokio::select! {
                () = shutdown.cancelled() => None,
                outcome = self.serve_line() => Some(outcome),
            };
            match outcome {
                None => {
                    self.state.set(TransportState::ShuttingDown);
                    self.state.set(TransportState::Stopped);
                    return Ok(());
                }
                Some(Ok(true)) => {}
                Some(Ok(false)) => {
                    self.state.set(TransportState::Stopped);
                    return Ok(());
                }
                Some(Err(err)) => {
                    tracing::error!(error = %err, "stdio transport failed");
                    self.state.set(TransportState::Failed);
                    return Err(err);
                }
            }
        }
    }

    /// Reads, handles, and answers one line; `false` at end of input.
    async fn serve_line(&mut self) -> Result<bool, TransportError> {
        let reply = match self.read_line().await? {
            Line::Eof => return Ok(false),
            Line::TooLong => Some(oversized_reply()),
            Line::Text(bytes) => {
                let payload = bytes.trim_ascii();
                if payload.is_empty() {
                    return Ok(true);
                }
                self.server.handle_payload(stdio_request_context(), payload, usize::MAX).await
            }
        };
        if let Some(reply) = reply {
            self.write_reply(&reply).await?;
        }
        Ok(true)
    }

    /// Reads one line, discarding it when it exceeds the limit.
    async fn read_line(&mut self) -> Result<Line, TransportError> {
        let limit = u64::try_from(self.max_line_bytes).unwrap_or(u64::MAX).saturating_add(1);
        let mut line = Vec::new();
        let read = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut line)
            .await
            .map_err(|err| TransportError::Io(err.to_string()))?;
        if read == 0 {
            return Ok(Line::Eof);
        }
        if line.last() == Some(&b'\n') {
            line.pop();
            return Ok(Line::Text(line));
        }
        if line.len() <= self.max_line_bytes {
            return Ok(Line::Text(line));
        }
        loop {
            line.clear();
            let read = (&mut self.reader)
                .take(limit)
                .read_until(b'\n', &mut line)
                .await
                .map_err(|err| TransportError::Io(err.to_string()))?;
            if read == 0 || line.last() == Some(&b'\n') {
                tracing::warn!(limit = self.max_line_bytes, "discarded oversized stdio line");
                return Ok(Line::TooLong);
            }
        }
    }

    /// Writes one reply line and flushes.
    async fn write_reply(&mut self, reply: &RpcReply) -> Result<(), TransportError> {
        let (_, response) = reply;
        let mut payload = encode_response(response).into_bytes();
        payload.push(b'\n');
        self.writer.write_all(&payload).await.map_err(|err| TransportError::Io(err.to_string()))?;
        self.writer.flush().await.map_err(|err| TransportError::Io(err.to_string()))
    }
}
