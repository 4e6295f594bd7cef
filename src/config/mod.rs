//! Configuration management for token-gate
//!
//! This module handles loading, parsing, and validating application configuration
//! from YAML files and environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Token issuance configuration
    #[serde(default)]
    pub tokens: TokensConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

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
        // First, expand environment variables in the YAML string
        let expanded = expand_env_vars(yaml);
        serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))
    }

    /// Load configuration from environment variables with prefix TOKEN_GATE_
    ///
    /// `PORT` and `DB_DATABASE` are honoured when the prefixed variables are unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // Server config from env
        if let Ok(host) = std::env::var("TOKEN_GATE_SERVER_HOST") {
            config.server.host = host;
        }
        if let Some(port) = env_with_fallback("TOKEN_GATE_SERVER_PORT", "PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| ConfigError::Parse(format!("Invalid port number '{}'", port)))?;
        }

        // Database config from env
        if let Some(path) = env_with_fallback("TOKEN_GATE_DATABASE_PATH", "DB_DATABASE") {
            config.database.path = path;
        }

        // Auth config from env
        if let Ok(username) = std::env::var("TOKEN_GATE_AUTH_ADMIN_USERNAME") {
            config.auth.admin_username = username;
        }
        if let Ok(password) = std::env::var("TOKEN_GATE_AUTH_ADMIN_PASSWORD") {
            config.auth.admin_password = Some(password);
        }

        if let Ok(level) = std::env::var("TOKEN_GATE_LOG_LEVEL") {
            config.logging.level = level;
        }

        Ok(config)
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tokens.max_length == 0 {
            return Err(ConfigError::InvalidValue(
                "tokens.max_length must be positive".to_string(),
            ));
        }
        if self.tokens.default_length == 0 || self.tokens.default_length > self.tokens.max_length {
            return Err(ConfigError::InvalidValue(format!(
                "tokens.default_length must be between 1 and {}",
                self.tokens.max_length
            )));
        }
        if self.tokens.default_ttl_secs <= 0 {
            return Err(ConfigError::InvalidValue(
                "tokens.default_ttl_secs must be positive".to_string(),
            ));
        }
        if self.database.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "database.timeout_ms must be positive".to_string(),
            ));
        }
        if self.auth.realm.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "auth.realm must not be empty".to_string(),
            ));
        }
        if self.auth.realm.contains('"') {
            return Err(ConfigError::InvalidValue(
                "auth.realm must not contain '\"'".to_string(),
            ));
        }
        if self.auth.admin_password.is_some() && self.auth.admin_username.is_empty() {
            return Err(ConfigError::MissingRequired(
                "auth.admin_username".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_with_fallback(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .or_else(|_| std::env::var(fallback))
        .ok()
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
    8080
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// Path to SQLite database file (`:memory:` for an ephemeral store)
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Deadline for a single store call in milliseconds
    #[serde(default = "default_database_timeout")]
    pub timeout_ms: u64,
}

impl DatabaseConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            timeout_ms: default_database_timeout(),
        }
    }
}

fn default_database_path() -> String {
    "/data/db/token-gate.db".to_string()
}

fn default_database_timeout() -> u64 {
    2000
}

/// Token issuance configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokensConfig {
    /// Value length used when a request does not give one
    #[serde(default = "default_token_length")]
    pub default_length: usize,

    /// Lifetime in seconds used when a request does not give one
    #[serde(default = "default_token_ttl")]
    pub default_ttl_secs: i64,

    /// Largest value length a request may ask for
    #[serde(default = "default_token_max_length")]
    pub max_length: usize,
}

impl Default for TokensConfig {
    fn default() -> Self {
        Self {
            default_length: default_token_length(),
            default_ttl_secs: default_token_ttl(),
            max_length: default_token_max_length(),
        }
    }
}

fn default_token_length() -> usize {
    32
}

fn default_token_ttl() -> i64 {
    3600
}

fn default_token_max_length() -> usize {
    256
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthConfig {
    /// Realm advertised in `WWW-Authenticate`
    #[serde(default = "default_realm")]
    pub realm: String,

    /// Bootstrap account name
    #[serde(default = "default_admin_username")]
    pub admin_username: String,

    /// Bootstrap account password; the account is seeded only when set
    pub admin_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            realm: default_realm(),
            admin_username: default_admin_username(),
            admin_password: None,
        }
    }
}

fn default_realm() -> String {
    "token-gate".to_string()
}

fn default_admin_username() -> String {
    "admin".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (`json` or `pretty`)
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
/// Supports `${VAR_NAME}` syntax
fn expand_env_vars(input: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .expect("Invalid regex pattern for environment variable expansion");

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
