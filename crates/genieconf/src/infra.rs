//! Infrastructure configuration - things that cannot change at runtime.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Filesystem paths for SynthGenie state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Base directory for runtime state.
    /// Default: ~/.local/share/synthgenie
    #[serde(default = "PathsConfig::default_state_dir")]
    pub state_dir: PathBuf,

    /// SQLite file holding per-key usage counters.
    /// Default: `<state_dir>/usage.db`
    #[serde(default)]
    pub usage_db: Option<PathBuf>,
}

impl PathsConfig {
    fn default_state_dir() -> PathBuf {
        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".local/share/synthgenie"))
            .unwrap_or_else(|| PathBuf::from(".local/share/synthgenie"))
    }

    /// Resolved location of the usage database.
    pub fn usage_db_path(&self) -> PathBuf {
        self.usage_db
            .clone()
            .unwrap_or_else(|| self.state_dir.join("usage.db"))
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_dir: Self::default_state_dir(),
            usage_db: None,
        }
    }
}

/// Network bind address for the HTTP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindConfig {
    /// Default: 127.0.0.1
    #[serde(default = "BindConfig::default_host")]
    pub host: String,

    /// Default: 8000
    #[serde(default = "BindConfig::default_http_port")]
    pub http_port: u16,
}

impl BindConfig {
    fn default_host() -> String {
        "127.0.0.1".to_string()
    }

    fn default_http_port() -> u16 {
        8000
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            http_port: Self::default_http_port(),
        }
    }
}

/// Logging and trace export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint. Empty disables span export.
    #[serde(default)]
    pub otlp_endpoint: String,

    /// Default log filter directive.
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }

    pub fn otlp_enabled(&self) -> bool {
        !self.otlp_endpoint.trim().is_empty()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: String::new(),
            log_level: Self::default_log_level(),
        }
    }
}

/// Which `X-API-Key` values the HTTP surface accepts.
///
/// With neither an admin key nor registered keys set, any non-empty key is
/// accepted and only used to count usage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub admin_api_key: Option<String>,

    #[serde(default)]
    pub api_keys: Vec<String>,
}

impl AuthConfig {
    /// No key list configured.
    pub fn is_open(&self) -> bool {
        self.admin_api_key.as_deref().map_or(true, str::is_empty) && self.api_keys.is_empty()
    }

    pub fn allows(&self, key: &str) -> bool {
        if self.is_open() {
            return !key.is_empty();
        }
        self.admin_api_key.as_deref() == Some(key) || self.api_keys.iter().any(|k| k == key)
    }
}
