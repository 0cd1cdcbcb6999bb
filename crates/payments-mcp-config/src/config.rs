// crates/payments-mcp-config/src/config.rs
// ============================================================================
// Module: Payments MCP Configuration
// Description: Configuration loading and validation for the Payments MCP server.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed: the server must never start
//! serving with a half-understood deployment description.
//!
//! Environment lookups go through a caller-supplied closure so resolution
//! rules can be exercised without touching the process environment.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fmt;
use std::fs;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "payments-mcp.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "PAYMENTS_MCP_CONFIG";
/// Environment variable overriding `credentials.key_id`.
pub const KEY_ID_ENV_VAR: &str = "PAYMENTS_MCP_KEY_ID";
/// Environment variable overriding `credentials.key_secret`.
pub const KEY_SECRET_ENV_VAR: &str = "PAYMENTS_MCP_KEY_SECRET";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default bind address for network transports.
pub(crate) const DEFAULT_ADDRESS: &str = "127.0.0.1";
/// Default bind port for network transports.
pub(crate) const DEFAULT_PORT: u16 = 8090;
/// Default maximum request body size in bytes.
pub(crate) const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
/// Default graceful shutdown deadline in milliseconds.
pub(crate) const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5_000;
/// Maximum graceful shutdown deadline in milliseconds.
pub(crate) const MAX_SHUTDOWN_TIMEOUT_MS: u64 = 120_000;
/// Maximum number of toolset entries.
pub(crate) const MAX_TOOLSET_ENTRIES: usize = 64;
/// Default downstream payment API base URL.
pub(crate) const DEFAULT_API_BASE_URL: &str = "https://api.razorpay.com/v1";
/// Default downstream request timeout in milliseconds.
pub(crate) const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
/// Maximum downstream request timeout in milliseconds.
pub(crate) const MAX_REQUEST_TIMEOUT_MS: u64 = 300_000;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Payments MCP configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaymentsMcpConfig {
    /// Server transport configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Toolset admission configuration.
    #[serde(default)]
    pub toolsets: ToolsetsConfig,
    /// Credential bound by the trusted-local transport.
    #[serde(default)]
    pub credentials: CredentialsConfig,
    /// Downstream payment API client configuration.
    #[serde(default)]
    pub api: ApiConfig,
    /// Log output configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PaymentsMcpConfig {
    /// Loads configuration using the process environment for resolution.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |name| env::var(name).ok())
    }

    /// Loads configuration with an explicit environment lookup.
    ///
    /// Resolution order: explicit path, then [`CONFIG_ENV_VAR`], then
    /// `payments-mcp.toml` in the working directory, then built-in defaults.
    /// Credential environment overrides are applied before validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load_with_env<F>(path: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self::read_with_env(path, lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads configuration using the process environment, without validating.
    ///
    /// Callers layering overrides on top (for example CLI flags) must call
    /// [`PaymentsMcpConfig::validate`] once the overrides are applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed.
    pub fn read(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::read_with_env(path, |name| env::var(name).ok())
    }

    /// Reads configuration with an explicit environment lookup, without validating.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed.
    pub fn read_with_env<F>(path: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match resolve_path(path, &lookup)? {
            Some(resolved) => Self::from_file(&resolved)?,
            None => Self::default(),
        };
        config.credentials.apply_env(&lookup);
        Ok(config)
    }

    /// Parses configuration from TOML text without validating it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the TOML is malformed.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Reads and parses a configuration file with size and encoding limits.
    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        validate_path(path)?;
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.toolsets.validate()?;
        self.api.validate()?;
        self.logging.validate()?;
        if self.server.transport == ServerTransport::Stdio && self.credentials.pair().is_none() {
            return Err(ConfigError::Invalid(
                "stdio transport requires credentials.key_id and credentials.key_secret"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Server transport configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Transport type for MCP.
    #[serde(default)]
    pub transport: ServerTransport,
    /// Bind address for HTTP or SSE transports.
    #[serde(default = "default_address")]
    pub address: String,
    /// Bind port for HTTP or SSE transports.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Graceful shutdown deadline for network transports.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: ServerTransport::Stdio,
            address: default_address(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

impl ServerConfig {
    /// Returns the graceful shutdown deadline.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Validates server transport configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_body_bytes must be greater than zero".to_string(),
            ));
        }
        if self.shutdown_timeout_ms == 0 || self.shutdown_timeout_ms > MAX_SHUTDOWN_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "shutdown_timeout_ms must be between 1 and {MAX_SHUTDOWN_TIMEOUT_MS}"
            )));
        }
        if self.transport.is_network() {
            let address = self.address.trim();
            if address.is_empty() {
                return Err(ConfigError::Invalid(
                    "http/sse transport requires bind address".to_string(),
                ));
            }
            if address.chars().any(char::is_whitespace) {
                return Err(ConfigError::Invalid("invalid bind address".to_string()));
            }
        }
        Ok(())
    }
}

/// Supported MCP transport types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServerTransport {
    /// Use stdin/stdout transport.
    #[default]
    Stdio,
    /// Use HTTP JSON-RPC transport.
    Http,
    /// Use Server-Sent-Events transport for responses.
    Sse,
}

impl ServerTransport {
    /// Returns a stable label for the transport.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
            Self::Sse => "sse",
        }
    }

    /// Returns true for transports reachable over the network.
    #[must_use]
    pub const fn is_network(self) -> bool {
        matches!(self, Self::Http | Self::Sse)
    }
}

impl fmt::Display for ServerTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Toolsets
// ============================================================================

/// Toolset admission configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsetsConfig {
    /// Toolsets to enable. Empty enables every toolset.
    #[serde(default)]
    pub enabled: Vec<String>,
    /// Suppresses every mutating tool when true.
    #[serde(default)]
    pub read_only: bool,
}

impl ToolsetsConfig {
    /// Validates toolset configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled.len() > MAX_TOOLSET_ENTRIES {
            return Err(ConfigError::Invalid("too many toolset entries".to_string()));
        }
        if self.enabled.iter().any(|name| name.trim().is_empty()) {
            return Err(ConfigError::Invalid("toolsets.enabled entries must be non-empty".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Credentials
// ============================================================================

/// Credential bound by the trusted-local transport.
#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialsConfig {
    /// Downstream API key identifier.
    #[serde(default)]
    pub key_id: Option<String>,
    /// Downstream API key secret.
    #[serde(default)]
    pub key_secret: Option<String>,
}

impl CredentialsConfig {
    /// Returns the key/secret pair when both are present and non-empty.
    #[must_use]
    pub fn pair(&self) -> Option<(&str, &str)> {
        let key = self.key_id.as_deref().filter(|value| !value.is_empty())?;
        let secret = self.key_secret.as_deref().filter(|value| !value.is_empty())?;
        Some((key, secret))
    }

    /// Applies non-empty environment overrides.
    fn apply_env<F>(&mut self, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(KEY_ID_ENV_VAR).filter(|value| !value.is_empty()) {
            self.key_id = Some(key);
        }
        if let Some(secret) = lookup(KEY_SECRET_ENV_VAR).filter(|value| !value.is_empty()) {
            self.key_secret = Some(secret);
        }
    }
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("key_id", &self.key_id)
            .field("key_secret", &self.key_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// ============================================================================
// SECTION: Downstream API
// ============================================================================

/// Downstream payment API client configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Base URL every tool path is joined onto.
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ApiConfig {
    /// Returns the per-request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validates downstream API configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.base_url)
            .map_err(|err| ConfigError::Invalid(format!("invalid api.base_url: {err}")))?;
        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(ConfigError::Invalid(
                "api.base_url must be an absolute http(s) url".to_string(),
            ));
        }
        if self.request_timeout_ms == 0 || self.request_timeout_ms > MAX_REQUEST_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "api.request_timeout_ms must be between 1 and {MAX_REQUEST_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Logging
// ============================================================================

/// Log output configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Output format for log records.
    #[serde(default)]
    pub format: LogFormat,
    /// `EnvFilter` directive string.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_log_filter(),
        }
    }
}

impl LoggingConfig {
    /// Validates logging configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.filter.trim().is_empty() {
            return Err(ConfigError::Invalid("logging.filter must be non-empty".to_string()));
        }
        Ok(())
    }
}

/// Log output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable multi-field output.
    #[default]
    Pretty,
    /// Single-line output.
    Compact,
    /// One JSON object per line.
    Json,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI, environment, or working directory.
fn resolve_path<F>(path: Option<&Path>, lookup: &F) -> Result<Option<PathBuf>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = path {
        return Ok(Some(path.to_path_buf()));
    }
    if let Some(env_path) = lookup(CONFIG_ENV_VAR).filter(|value| !value.is_empty()) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(Some(PathBuf::from(env_path)));
    }
    let fallback = PathBuf::from(DEFAULT_CONFIG_NAME);
    Ok(fallback.is_file().then_some(fallback))
}

/// Validates path length limits before touching the filesystem.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        if let Component::Normal(value) = component
            && value.len() > MAX_PATH_COMPONENT_LENGTH
        {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Default bind address.
fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

/// Default bind port.
const fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Default request body limit.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Default shutdown deadline.
const fn default_shutdown_timeout_ms() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_MS
}

/// Default downstream base URL.
fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

/// Default downstream request timeout.
const fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

/// Default log filter directive.
fn default_log_filter() -> String {
    "info".to_string()
}
