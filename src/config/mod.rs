//! Configuration management for fanrelay
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then `FANRELAY_*` environment variables.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::resolver::Location;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Outbound client configuration
    pub client: ClientConfig,

    /// Worker pool configuration
    pub runtime: RuntimeConfig,

    /// Orchestration handler configuration
    pub handler: HandlerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Logical service name to ordered replica locations
    pub services: HashMap<String, Vec<Location>>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_address: SocketAddr,

    /// Enable CORS for all routes
    pub enable_cors: bool,

    /// Enable per-request logging
    pub enable_request_logging: bool,

    /// Suspension timeout before a handler extends it, in seconds
    pub default_timeout_secs: u64,

    /// Largest suspension timeout a handler may request, in seconds
    pub max_suspend_timeout_secs: u64,
}

/// Outbound HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// Maximum number of dispatches in flight at once
    pub max_concurrent_requests: usize,

    /// User agent string
    pub user_agent: String,
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Number of worker threads running requests and continuations
    pub worker_threads: usize,
}

/// Orchestration handler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    /// Logical service the fan-out calls go to
    pub backend_service: String,

    /// Suspension timeout requested before async work starts, in seconds
    pub suspend_timeout_secs: u64,

    /// Delay requested by the long-running fan-out member, in seconds
    pub long_delay_secs: u64,

    /// Largest accepted fan-out count
    pub max_fanout: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl Config {
    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Load the configuration a command runs with: the file at `path` (or the
    /// defaults), then environment overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        }
        .with_env_overrides()?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file. Missing sections keep defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply `FANRELAY_*` environment variables on top of this configuration
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(addr) = env_var("FANRELAY_BIND_ADDRESS") {
            self.server.bind_address = addr
                .parse()
                .map_err(|_| ConfigError::invalid("bind_address", format!("Invalid address: {addr}")))?;
        }
        if let Some(threads) = env_parse("FANRELAY_WORKER_THREADS", "worker_threads")? {
            self.runtime.worker_threads = threads;
        }
        if let Some(max) = env_parse("FANRELAY_MAX_CONCURRENT_REQUESTS", "max_concurrent_requests")? {
            self.client.max_concurrent_requests = max;
        }
        if let Some(secs) = env_parse("FANRELAY_REQUEST_TIMEOUT", "request_timeout_secs")? {
            self.client.request_timeout_secs = secs;
        }
        if let Some(service) = env_var("FANRELAY_BACKEND_SERVICE") {
            self.handler.backend_service = service;
        }
        if let Some(level) = env_var("FANRELAY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = env_var("FANRELAY_LOG_FORMAT") {
            self.logging.format = format;
        }
        Ok(self)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;

        if self.client.max_concurrent_requests == 0 {
            return Err(ConfigError::invalid(
                "max_concurrent_requests",
                "Must allow at least 1 request",
            ));
        }
        if self.client.request_timeout_secs == 0 {
            return Err(ConfigError::invalid("request_timeout_secs", "Must be positive"));
        }
        if self.runtime.worker_threads == 0 {
            return Err(ConfigError::invalid("worker_threads", "Must be greater than 0"));
        }
        if self.handler.suspend_timeout_secs == 0 {
            return Err(ConfigError::invalid("suspend_timeout_secs", "Must be positive"));
        }
        if !self.services.contains_key(&self.handler.backend_service) {
            return Err(ConfigError::invalid(
                "backend_service",
                format!("No locations configured for '{}'", self.handler.backend_service),
            ));
        }
        for (service, locations) in &self.services {
            if locations.is_empty() {
                return Err(ConfigError::invalid(
                    "services",
                    format!("Service '{service}' has no locations"),
                ));
            }
        }
        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(ConfigError::invalid(
                "logging.format",
                format!("Unknown format '{}'", self.logging.format),
            ));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut services = HashMap::new();
        // first replica is deliberately unreachable so failover shows up in the logs
        services.insert(
            "brave".to_string(),
            vec![
                Location::new("localhost", 6666),
                Location::new("localhost", 8080),
                Location::new("localhost", 9999),
            ],
        );

        Self {
            server: ServerConfig::default(),
            client: ClientConfig::default(),
            runtime: RuntimeConfig::default(),
            handler: HandlerConfig::default(),
            logging: LoggingConfig::default(),
            services,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
            enable_cors: true,
            enable_request_logging: true,
            default_timeout_secs: 10,
            max_suspend_timeout_secs: 60,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            connect_timeout_secs: 5,
            max_concurrent_requests: 20,
            user_agent: format!("fanrelay/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { worker_threads: 10 }
    }
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            backend_service: "brave".to_string(),
            suspend_timeout_secs: 20,
            long_delay_secs: 1,
            max_fanout: 100,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl ServerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_timeout_secs == 0 {
            return Err(ConfigError::invalid("default_timeout_secs", "Must be positive"));
        }
        if self.max_suspend_timeout_secs < self.default_timeout_secs {
            return Err(ConfigError::invalid(
                "max_suspend_timeout_secs",
                "Must not be smaller than default_timeout_secs",
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    #[must_use]
    pub fn max_suspend_timeout(&self) -> Duration {
        Duration::from_secs(self.max_suspend_timeout_secs)
    }
}

impl ClientConfig {
    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl HandlerConfig {
    #[must_use]
    pub fn suspend_timeout(&self) -> Duration {
        Duration::from_secs(self.suspend_timeout_secs)
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, field: &str) -> Result<Option<T>, ConfigError> {
    match env_var(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::invalid(field, format!("{key}='{raw}' is not valid"))),
        None => Ok(None),
    }
}
