// crates/payments-mcp/src/api.rs
// ============================================================================
// Module: Payment API Client
// Description: Downstream payment API boundary and HTTP implementation.
// Purpose: Bind credentials to clients and resolve one client per tool call.
// Dependencies: async-trait, reqwest, serde_json, url
// ============================================================================

//! ## Overview
//! Tools talk to the payment provider through the [`PaymentApi`] trait.
//! [`PaymentApiFactory`] binds a [`Credential`] to a client; [`ApiClients`]
//! picks which client serves a call:
//!
//! - a credential on the request context yields a call-scoped client;
//! - otherwise the server-wide client bound at startup is used;
//! - with neither, the call is rejected.
//!
//! Security posture: downstream responses are untrusted and error bodies are
//! truncated before they reach callers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use payments_mcp_config::ApiConfig;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::context::RequestContext;
use crate::credential::Credential;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Connect timeout for downstream requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Maximum characters of a downstream error body echoed to callers.
const MAX_ERROR_MESSAGE_CHARS: usize = 512;
/// User agent sent downstream.
const USER_AGENT: &str = concat!("payments-mcp/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// SECTION: Requests
// ============================================================================

/// HTTP methods used by payment tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// Read request.
    Get,
    /// Create or action request.
    Post,
    /// Partial update request.
    Patch,
}

impl HttpMethod {
    /// Returns the method label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
        }
    }
}

/// Downstream request built by a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Path segments appended to the base URL. Segments are percent-encoded.
    pub path: Vec<String>,
    /// Query string pairs.
    pub query: Vec<(String, String)>,
    /// JSON body for non-GET requests.
    pub body: Option<Value>,
}

// ============================================================================
// SECTION: Client Boundary
// ============================================================================

/// Client for the downstream payment API.
#[async_trait]
pub trait PaymentApi: Send + Sync {
    /// Sends a request and returns the decoded JSON response.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status, or decode failures.
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError>;
}

/// Binds credentials to payment API clients.
pub trait PaymentApiFactory: Send + Sync {
    /// Returns a client that authenticates with `credential`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Init`] when the client cannot be built.
    fn connect(&self, credential: &Credential) -> Result<Arc<dyn PaymentApi>, ApiError>;
}

/// Resolves the downstream client for each tool call.
#[derive(Clone)]
pub struct ApiClients {
    /// Factory for call-scoped clients.
    factory: Arc<dyn PaymentApiFactory>,
    /// Server-wide client bound at startup.
    bound: Option<Arc<dyn PaymentApi>>,
}

impl ApiClients {
    /// Builds a resolver with no server-wide client.
    #[must_use]
    pub fn per_request(factory: Arc<dyn PaymentApiFactory>) -> Self {
        Self {
            factory,
            bound: None,
        }
    }

    /// Builds a resolver with a server-wide client bound to `credential`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Init`] when the client cannot be built.
    pub fn bound(
        factory: Arc<dyn PaymentApiFactory>,
        credential: &Credential,
    ) -> Result<Self, ApiError> {
        let bound = factory.connect(credential)?;
        Ok(Self {
            factory,
            bound: Some(bound),
        })
    }

    /// Returns the client serving a call made with `context`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::MissingCredential`] when neither the context nor
    /// the server carries a credential.
    pub fn resolve(&self, context: &RequestContext) -> Result<Arc<dyn PaymentApi>, ApiError> {
        if let Some(credential) = context.credential() {
            return self.factory.connect(credential);
        }
        self.bound.clone().ok_or(ApiError::MissingCredential)
    }
}

// ============================================================================
// SECTION: HTTP Client
// ============================================================================

/// Factory producing [`HttpPaymentApi`] clients that share one connection pool.
pub struct HttpPaymentApiFactory {
    /// Base URL every request path is appended to.
    base_url: Url,
    /// Shared HTTP client configured with timeouts.
    client: Client,
}

impl HttpPaymentApiFactory {
    /// Builds a factory from API configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Init`] when the base URL or HTTP client is invalid.
    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|err| ApiError::Init(format!("invalid base url: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::Init("base url cannot carry a path".to_string()));
        }
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(config.request_timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| ApiError::Init(err.to_string()))?;
        Ok(Self {
            base_url,
            client,
        })
    }
}

impl PaymentApiFactory for HttpPaymentApiFactory {
    fn connect(&self, credential: &Credential) -> Result<Arc<dyn PaymentApi>, ApiError> {
        Ok(Arc::new(HttpPaymentApi {
            base_url: self.base_url.clone(),
            client: self.client.clone(),
            credential: credential.clone(),
        }))
    }
}

/// Payment API client authenticating with HTTP basic auth.
pub struct HttpPaymentApi {
    /// Base URL every request path is appended to.
    base_url: Url,
    /// HTTP client.
    client: Client,
    /// Credential sent with every request.
    credential: Credential,
}

impl HttpPaymentApi {
    /// Builds the absolute URL for a request.
    fn endpoint(&self, request: &ApiRequest) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                ApiError::InvalidRequest("base url cannot carry a path".to_string())
            })?;
            segments.pop_if_empty();
            for segment in &request.path {
                segments.push(segment);
            }
        }
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        Ok(url)
    }
}

#[async_trait]
impl PaymentApi for HttpPaymentApi {
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let url = self.endpoint(&request)?;
        let builder = match request.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
            HttpMethod::Patch => self.client.patch(url),
        };
        let mut builder =
            builder.basic_auth(self.credential.key(), Some(self.credential.secret()));
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let response =
            builder.send().await.map_err(|err| ApiError::Transport(err.to_string()))?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(|err| ApiError::Transport(err.to_string()))?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&bytes),
            });
        }
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode(err.to_string()))
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Payment API errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Client construction failed.
    #[error("payment api client init failed: {0}")]
    Init(String),
    /// No credential is available for the call.
    #[error("no credential available for payment api call")]
    MissingCredential,
    /// Request could not be built.
    #[error("invalid payment api request: {0}")]
    InvalidRequest(String),
    /// Network or protocol failure.
    #[error("payment api unavailable: {0}")]
    Transport(String),
    /// Non-success HTTP status.
    #[error("payment api returned status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Provider error description.
        message: String,
    },
    /// Response body was not valid JSON.
    #[error("payment api response decode failed: {0}")]
    Decode(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Extracts a bounded error description from a downstream error body.
///
/// Prefers the provider's `error.description` field and falls back to the
/// raw body text.
fn error_message(bytes: &[u8]) -> String {
    let described = serde_json::from_slice::<Value>(bytes).ok().and_then(|body| {
        body.get("error")
            .and_then(|error| error.get("description"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    let message = described.unwrap_or_else(|| String::from_utf8_lossy(bytes).trim().to_string());
    if message.is_empty() {
        return "no error description".to_string();
    }
    message.chars().take(MAX_ERROR_MESSAGE_CHARS).collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
