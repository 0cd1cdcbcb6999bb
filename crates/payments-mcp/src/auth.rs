// crates/payments-mcp/src/auth.rs
// ============================================================================
// Module: Request Authentication
// Description: Trusted-local and per-request bearer credential authentication.
// Purpose: Derive the downstream credential for each call.
// Dependencies: base64, thiserror
// ============================================================================

//! ## Overview
//! Each server instance runs exactly one [`Authenticator`]:
//!
//! - [`TrustedLocalAuth`] for stdio: the process owner is the caller, and the
//!   credential loaded at startup is bound server-wide.
//! - [`BearerCredentialAuth`] for HTTP and SSE: every call carries
//!   `Authorization: Bearer base64(key:secret)` and gets its own credential.
//!
//! Security posture: tokens are untrusted input; failures reject the call
//! before any tool runs.
//!
//! ## Limitations
//! The decoded token is split on every `:`, so secrets containing a colon are
//! rejected as invalid tokens.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

use crate::context::RequestContext;
use crate::credential::Credential;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum size of an `Authorization` header considered for extraction.
const MAX_AUTH_HEADER_BYTES: usize = 8 * 1024;
/// Rejection reason for a missing or empty token.
pub const NO_AUTH_TOKEN: &str = "no auth token provided";
/// Rejection reason for a token that does not decode to `key:secret`.
pub const INVALID_AUTH_TOKEN: &str = "invalid auth token";

// ============================================================================
// SECTION: Authenticators
// ============================================================================

/// How a server authenticates its callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Caller is the local process owner; credentials come from config.
    TrustedLocal,
    /// Every call carries its own credential.
    PerRequest,
}

impl AuthMode {
    /// Returns a stable label for the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TrustedLocal => "trusted_local",
            Self::PerRequest => "per_request",
        }
    }
}

/// Authenticates a call and derives its enriched context.
pub trait Authenticator: Send + Sync {
    /// Returns the authentication mode.
    fn mode(&self) -> AuthMode;

    /// Authenticates `context`, returning the derived context.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthorized`] when the call must be rejected.
    fn authenticate(&self, context: RequestContext) -> Result<RequestContext, AuthError>;
}

/// Authenticator for the trusted-local stdio transport.
pub struct TrustedLocalAuth {
    /// Credential loaded at startup and bound server-wide.
    credential: Credential,
}

impl TrustedLocalAuth {
    /// Builds a trusted-local authenticator around the startup credential.
    #[must_use]
    pub const fn new(credential: Credential) -> Self {
        Self {
            credential,
        }
    }

    /// Credential bound server-wide.
    #[must_use]
    pub const fn credential(&self) -> &Credential {
        &self.credential
    }
}

impl Authenticator for TrustedLocalAuth {
    fn mode(&self) -> AuthMode {
        AuthMode::TrustedLocal
    }

    fn authenticate(&self, context: RequestContext) -> Result<RequestContext, AuthError> {
        Ok(context)
    }
}

/// Per-request authenticator decoding `base64(key:secret)` bearer tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct BearerCredentialAuth;

impl Authenticator for BearerCredentialAuth {
    fn mode(&self) -> AuthMode {
        AuthMode::PerRequest
    }

    fn authenticate(&self, context: RequestContext) -> Result<RequestContext, AuthError> {
        let token = context.auth_token().filter(|token| !token.is_empty());
        let Some(token) = token else {
            return Err(AuthError::Unauthorized(NO_AUTH_TOKEN.to_string()));
        };
        let credential = decode_credential(token)?;
        Ok(context.with_credential(credential))
    }
}

// ============================================================================
// SECTION: Token Handling
// ============================================================================

/// Decodes a `base64(key:secret)` token into a credential.
///
/// # Errors
///
/// Returns [`AuthError::Unauthorized`] when the token is not standard base64,
/// not UTF-8, or does not split into exactly two `:`-separated parts.
pub fn decode_credential(token: &str) -> Result<Credential, AuthError> {
    let invalid = || AuthError::Unauthorized(INVALID_AUTH_TOKEN.to_string());
    let decoded = STANDARD.decode(token).map_err(|_| invalid())?;
    let decoded = String::from_utf8(decoded).map_err(|_| invalid())?;
    let parts: Vec<&str> = decoded.split(':').collect();
    match parts.as_slice() {
        [key, secret] => Ok(Credential::new(*key, *secret)),
        _ => Err(invalid()),
    }
}

/// Extracts the bearer token from an `Authorization` header value.
///
/// Never fails: a missing, oversized, or non-bearer header yields `None` and
/// the authenticator decides whether that is acceptable.
#[must_use]
pub fn extract_bearer_token(auth_header: Option<&str>) -> Option<String> {
    let header = auth_header?;
    if header.len() > MAX_AUTH_HEADER_BYTES {
        return None;
    }
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Authentication errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The call is rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
