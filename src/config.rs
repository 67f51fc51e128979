//! Connection settings.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default OrientDB HTTP port.
pub const DEFAULT_PORT: u16 = 2480;

/// Default request timeout in milliseconds.
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Config file name within the odbgraph config directory.
const CONFIG_FILE: &str = "config.yaml";

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_timeout_ms() -> Option<u64> {
    Some(DEFAULT_TIMEOUT_MS)
}

/// Where and how to reach the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Server host name or address
    pub host: String,

    /// HTTP port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database name
    pub database: String,

    pub username: String,

    pub password: String,

    /// Use https instead of http
    #[serde(default)]
    pub tls: bool,

    /// Client-side timeout per request; `None` waits forever
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: Option<u64>,
}

impl ConnectionConfig {
    /// Create config with default port and timeout.
    pub fn new(
        host: impl Into<String>,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            database: database.into(),
            username: username.into(),
            password: password.into(),
            tls: false,
            timeout_ms: default_timeout_ms(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Set the request timeout (`None` disables it).
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout_ms = timeout.map(|t| t.as_millis().max(1) as u64);
        self
    }

    /// Load config from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Default config file location.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("odbgraph")
            .join(CONFIG_FILE)
    }

    /// Request timeout as a duration.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Scheme, host and port, without a trailing slash.
    pub fn base_url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}
