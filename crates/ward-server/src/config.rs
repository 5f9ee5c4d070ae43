//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use thiserror::Error;
use ward_db::DbRuntimeSettings;
use ward_types::{Messages, SchemaPolicy};

use crate::{RequestLimits, MAX_REQUEST_BODY_BYTES};

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Envelope texts.
    #[serde(default)]
    pub messages: Messages,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted request body, in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Optional per-request deadline, in seconds.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// SQLite busy timeout, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,

    /// How long a request waits for a pooled connection, in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// How the patients table is guaranteed.
    #[serde(default)]
    pub schema_policy: SchemaPolicy,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "ward_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    3000
}

fn default_max_body_bytes() -> usize {
    MAX_REQUEST_BODY_BYTES
}

fn default_db_path() -> String {
    "ward.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    DbRuntimeSettings::default().busy_timeout_ms
}

fn default_pool_max_size() -> u32 {
    DbRuntimeSettings::default().pool_max_size
}

fn default_connection_timeout_ms() -> u64 {
    DbRuntimeSettings::default().connection_timeout_ms
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
            request_timeout_secs: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
            connection_timeout_ms: default_connection_timeout_ms(),
            schema_policy: SchemaPolicy::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl ServerConfig {
    /// Router limits derived from this section.
    pub fn limits(&self) -> RequestLimits {
        RequestLimits {
            max_body_bytes: self.max_body_bytes,
            request_timeout: self
                .request_timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }
}

impl DatabaseConfig {
    /// Pool settings derived from this section.
    pub fn runtime_settings(&self) -> DbRuntimeSettings {
        DbRuntimeSettings {
            busy_timeout_ms: self.busy_timeout_ms,
            pool_max_size: self.pool_max_size,
            connection_timeout_ms: self.connection_timeout_ms,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Picks the configuration file: first CLI argument, then `WARD_CONFIG_PATH`.
///
/// Returns the path (if any) and a label naming where it came from.
pub fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("WARD_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `WARD_HOST` overrides `server.host`
/// - `WARD_PORT` overrides `server.port`
/// - `WARD_MAX_BODY_BYTES` overrides `server.max_body_bytes`
/// - `WARD_REQUEST_TIMEOUT_SECS` overrides `server.request_timeout_secs`
/// - `WARD_DB_PATH` overrides `database.path`
/// - `WARD_DB_BUSY_TIMEOUT_MS` overrides `database.busy_timeout_ms`
/// - `WARD_DB_POOL_MAX_SIZE` overrides `database.pool_max_size`
/// - `WARD_SCHEMA_POLICY` overrides `database.schema_policy`
/// - `WARD_LOG_LEVEL` overrides `logging.level`
/// - `WARD_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    Ok(apply_env_overrides(config, |key| std::env::var(key).ok()))
}

/// Applies `WARD_*` overrides read through `lookup`.
///
/// Values that fail to parse are logged and ignored.
pub fn apply_env_overrides(mut config: Config, lookup: impl Fn(&str) -> Option<String>) -> Config {
    fn parsed<T: std::str::FromStr>(key: &str, raw: Option<String>) -> Option<T> {
        let raw = raw?;
        match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(key, value = %raw, "ignoring unparseable environment override");
                None
            }
        }
    }

    if let Some(host) = parsed("WARD_HOST", lookup("WARD_HOST")) {
        config.server.host = host;
    }
    if let Some(port) = parsed("WARD_PORT", lookup("WARD_PORT")) {
        config.server.port = port;
    }
    if let Some(bytes) = parsed("WARD_MAX_BODY_BYTES", lookup("WARD_MAX_BODY_BYTES")) {
        config.server.max_body_bytes = bytes;
    }
    if let Some(secs) = parsed("WARD_REQUEST_TIMEOUT_SECS", lookup("WARD_REQUEST_TIMEOUT_SECS")) {
        config.server.request_timeout_secs = Some(secs);
    }
    if let Some(db_path) = lookup("WARD_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(ms) = parsed("WARD_DB_BUSY_TIMEOUT_MS", lookup("WARD_DB_BUSY_TIMEOUT_MS")) {
        config.database.busy_timeout_ms = ms;
    }
    if let Some(size) = parsed("WARD_DB_POOL_MAX_SIZE", lookup("WARD_DB_POOL_MAX_SIZE")) {
        config.database.pool_max_size = size;
    }
    if let Some(policy) = parsed("WARD_SCHEMA_POLICY", lookup("WARD_SCHEMA_POLICY")) {
        config.database.schema_policy = policy;
    }
    if let Some(level) = lookup("WARD_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("WARD_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    config
}
