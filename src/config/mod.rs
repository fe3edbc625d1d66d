//! Configuration management for membership-service
//!
//! This module handles loading, parsing, and validating application configuration
//! from YAML files and environment variables.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::auth::ratelimit::RateLimitConfig;
use crate::auth::token::MAX_TOKEN_TTL_SECS;

/// Shortest accepted signing secret, in bytes
pub const MIN_SECRET_BYTES: usize = 32;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(yaml);
        serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))
    }

    /// Load configuration from environment variables with prefix MEMBERSHIP_
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Ok(host) = std::env::var("MEMBERSHIP_SERVER_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("MEMBERSHIP_SERVER_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid port number".to_string()))?;
        }

        if let Ok(path) = std::env::var("MEMBERSHIP_DATABASE_PATH") {
            config.database.path = path;
        }

        if let Ok(secret) = std::env::var("MEMBERSHIP_AUTH_JWT_SECRET") {
            config.auth.jwt_secret = Some(SecretString::new(secret));
        }
        if let Ok(ttl) = std::env::var("MEMBERSHIP_AUTH_TOKEN_TTL_SECS") {
            config.auth.token_ttl_secs = ttl
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid token TTL".to_string()))?;
        }
        if let Ok(max) = std::env::var("MEMBERSHIP_AUTH_RATE_LIMIT_MAX_FAILURES") {
            config.auth.rate_limit.max_failures = max
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid max failures".to_string()))?;
        }
        if let Ok(block) = std::env::var("MEMBERSHIP_AUTH_RATE_LIMIT_BLOCK_DURATION_SECS") {
            config.auth.rate_limit.block_duration_secs = block
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid block duration".to_string()))?;
        }
        if let Ok(window) = std::env::var("MEMBERSHIP_AUTH_RATE_LIMIT_WINDOW_DURATION_SECS") {
            config.auth.rate_limit.window_duration_secs = window
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid window duration".to_string()))?;
        }

        if let Ok(level) = std::env::var("MEMBERSHIP_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("MEMBERSHIP_LOG_FORMAT") {
            config.logging.format = format;
        }

        Ok(config)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        let secret = self
            .auth
            .jwt_secret
            .as_ref()
            .ok_or_else(|| ConfigError::MissingRequired("auth.jwt_secret".to_string()))?;
        if secret.expose().len() < MIN_SECRET_BYTES {
            return Err(ConfigError::InvalidValue(format!(
                "auth.jwt_secret must be at least {} bytes",
                MIN_SECRET_BYTES
            )));
        }

        if self.auth.token_ttl_secs == 0 || self.auth.token_ttl_secs > MAX_TOKEN_TTL_SECS {
            return Err(ConfigError::InvalidValue(format!(
                "auth.token_ttl_secs must be between 1 and {}",
                MAX_TOKEN_TTL_SECS
            )));
        }

        if self.auth.rate_limit.max_failures == 0 {
            return Err(ConfigError::InvalidValue(
                "auth.rate_limit.max_failures must be greater than zero".to_string(),
            ));
        }

        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidValue(format!(
                "logging.format must be 'json' or 'pretty', got '{}'",
                self.logging.format
            )));
        }

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthConfig {
    /// Token signing secret
    #[serde(default)]
    pub jwt_secret: Option<SecretString>,

    /// Session token lifetime in seconds
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,

    /// Failed-login throttling
    #[serde(default)]
    pub rate_limit: LoginRateLimitConfig,
}

impl AuthConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_secs: default_token_ttl(),
            rate_limit: LoginRateLimitConfig::default(),
        }
    }
}

fn default_token_ttl() -> u64 {
    crate::auth::token::DEFAULT_TOKEN_TTL_SECS
}

/// Rate limiting configuration for failed logins
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginRateLimitConfig {
    /// Maximum number of failed attempts before blocking
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,

    /// Duration to block after max failures (in seconds)
    #[serde(default = "default_block_duration")]
    pub block_duration_secs: u64,

    /// Window in which failures are counted (in seconds)
    #[serde(default = "default_window_duration")]
    pub window_duration_secs: u64,
}

impl Default for LoginRateLimitConfig {
    fn default() -> Self {
        Self {
            max_failures: default_max_failures(),
            block_duration_secs: default_block_duration(),
            window_duration_secs: default_window_duration(),
        }
    }
}

impl From<&LoginRateLimitConfig> for RateLimitConfig {
    fn from(config: &LoginRateLimitConfig) -> Self {
        Self {
            max_failures: config.max_failures,
            block_duration: Duration::from_secs(config.block_duration_secs),
            window_duration: Duration::from_secs(config.window_duration_secs),
        }
    }
}

fn default_max_failures() -> u32 {
    10
}

fn default_block_duration() -> u64 {
    300
}

fn default_window_duration() -> u64 {
    600
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "membership.db".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format, `json` or `pretty`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// String that never appears in `Debug` output or serialized config
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The secret value itself
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Serialize for SecretString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

/// Expand environment variables in a string
///
/// Supports `${VAR_NAME}` syntax. Unset variables are left as written.
fn expand_env_vars(input: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .expect("Invalid regex pattern for environment variable expansion");

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
