// crates/payments-mcp/src/credential.rs
// ============================================================================
// Module: Downstream Credential
// Description: Key/secret pair identifying a caller to the payment API.
// Purpose: Immutable credential value with redacted debug output.
// Dependencies: std
// ============================================================================

//! ## Overview
//! A [`Credential`] is built once (from configuration for the trusted-local
//! transport, or from a decoded bearer token for network transports) and is
//! never mutated afterwards. The secret is never rendered by `Debug`.

use std::fmt;

/// API key/secret pair for the downstream payment API.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Public key identifier.
    key: String,
    /// Private key secret.
    secret: String,
}

impl Credential {
    /// Builds a credential from its parts.
    #[must_use]
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    /// Returns the key identifier.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the key secret.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential").field("key", &self.key).field("secret", &"<redacted>").finish()
    }
}
