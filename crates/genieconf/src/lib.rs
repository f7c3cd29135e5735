//! Configuration loading for SynthGenie.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/synthgenie/config.toml` (system)
//! 2. `~/.config/synthgenie/config.toml` (user)
//! 3. `./synthgenie.toml` (local override, or the `--config` path)
//! 4. Environment variables (`SYNTHGENIE_*`, plus `RUST_LOG`,
//!    `OTEL_EXPORTER_OTLP_ENDPOINT` and `OPENAI_API_KEY`)
//!
//! Files are merged table by table, so a local file only needs the keys it
//! changes.
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! state_dir = "~/.local/share/synthgenie"
//!
//! [bind]
//! host = "127.0.0.1"
//! http_port = 8000
//!
//! [telemetry]
//! otlp_endpoint = "127.0.0.1:4317"
//! log_level = "info"
//!
//! [dispatch]
//! max_prompt_length = 2000
//! machine_retries = 2
//! router_retries = 1
//! model_timeout_ms = 60000
//!
//! [model]
//! base_url = "https://api.openai.com/v1"
//! model = "gpt-4"
//! temperature = 0.3
//!
//! [auth]
//! admin_api_key = "..."
//! api_keys = ["sk-..."]
//! ```

pub mod dispatch;
pub mod infra;
pub mod loader;

pub use dispatch::{DispatchConfig, ModelConfig};
pub use infra::{AuthConfig, BindConfig, PathsConfig, TelemetryConfig};
pub use loader::{discover_config_files_with_override, ConfigSources};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete SynthGenie configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GenieConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub bind: BindConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub auth: AuthConfig,
}

impl GenieConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration with `config_path` standing in for the local
    /// `./synthgenie.toml`, then apply env overrides.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and return information about sources.
    pub fn load_with_sources() -> Result<(Self, ConfigSources), ConfigError> {
        Self::load_with_sources_from(None)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let files = loader::discover_config_files_with_override(config_path);
        let (mut config, mut sources) = Self::load_files(&files)?;
        loader::apply_env_overrides(&mut config, &mut sources);
        Ok((config, sources))
    }

    /// Merge exactly these files in order, without env overrides.
    pub fn load_files(files: &[PathBuf]) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        for path in files {
            let table = loader::load_table(path)?;
            loader::merge_tables(&mut merged, table);
            sources.files.push(path.clone());
        }

        let origin = sources
            .files
            .last()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("<defaults>"));
        let config = loader::from_table(merged, &origin)?;
        Ok((config, sources))
    }

    /// Serialize config to TOML string. The model API key is redacted.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# SynthGenie Configuration\n\n");

        output.push_str("[paths]\n");
        output.push_str(&format!("state_dir = \"{}\"\n", self.paths.state_dir.display()));
        output.push_str(&format!(
            "usage_db = \"{}\"\n",
            self.paths.usage_db_path().display()
        ));

        output.push_str("\n[bind]\n");
        output.push_str(&format!("host = \"{}\"\n", self.bind.host));
        output.push_str(&format!("http_port = {}\n", self.bind.http_port));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("otlp_endpoint = \"{}\"\n", self.telemetry.otlp_endpoint));
        output.push_str(&format!("log_level = \"{}\"\n", self.telemetry.log_level));

        output.push_str("\n[dispatch]\n");
        output.push_str(&format!("max_prompt_length = {}\n", self.dispatch.max_prompt_length));
        output.push_str(&format!("machine_retries = {}\n", self.dispatch.machine_retries));
        output.push_str(&format!("router_retries = {}\n", self.dispatch.router_retries));
        output.push_str(&format!("routing_timeout_ms = {}\n", self.dispatch.routing_timeout_ms));
        output.push_str(&format!("model_timeout_ms = {}\n", self.dispatch.model_timeout_ms));
        output.push_str(&format!("max_model_requests = {}\n", self.dispatch.max_model_requests));

        output.push_str("\n[model]\n");
        output.push_str(&format!("base_url = \"{}\"\n", self.model.base_url));
        output.push_str(&format!("model = \"{}\"\n", self.model.model));
        output.push_str(&format!("router_model = \"{}\"\n", self.model.router_model()));
        output.push_str(&format!(
            "classifier_model = \"{}\"\n",
            self.model.classifier_model()
        ));
        if self.model.api_key.is_some() {
            output.push_str("api_key = \"<redacted>\"\n");
        }
        output.push_str(&format!("temperature = {}\n", self.model.temperature));

        output.push_str("\n[auth]\n");
        if self.auth.admin_api_key.is_some() {
            output.push_str("admin_api_key = \"<redacted>\"\n");
        }
        output.push_str(&format!("# {} registered api_keys\n", self.auth.api_keys.len()));

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = GenieConfig::default();
        assert_eq!(config.bind.http_port, 8000);
        assert_eq!(config.dispatch.machine_retries, 2);
        assert_eq!(config.dispatch.router_retries, 1);
        assert_eq!(config.dispatch.max_model_requests, 64);
        assert!(!config.telemetry.otlp_enabled());
    }

    #[test]
    fn test_to_toml_round_trips_and_redacts() {
        let mut config = GenieConfig::default();
        config.model.api_key = Some("sk-secret".to_string());
        config.auth.api_keys = vec!["sk-caller".to_string()];
        let rendered = config.to_toml();
        assert!(rendered.contains("[auth]"));
        assert!(!rendered.contains("sk-caller"));
        assert!(rendered.contains("[dispatch]"));
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("sk-secret"));

        let reparsed: GenieConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(reparsed.dispatch, config.dispatch);
        assert_eq!(reparsed.bind, config.bind);
    }

    #[test]
    fn test_load_files_merges_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.toml");
        let second = dir.path().join("second.toml");
        writeln!(
            std::fs::File::create(&first).unwrap(),
            "[bind]\nhost = \"0.0.0.0\"\nhttp_port = 9000\n\n[model]\nmodel = \"base\""
        )
        .unwrap();
        writeln!(
            std::fs::File::create(&second).unwrap(),
            "[bind]\nhttp_port = 9001"
        )
        .unwrap();

        let (config, sources) = GenieConfig::load_files(&[first.clone(), second.clone()]).unwrap();
        assert_eq!(config.bind.host, "0.0.0.0");
        assert_eq!(config.bind.http_port, 9001);
        assert_eq!(config.model.model, "base");
        assert_eq!(sources.files, vec![first, second]);
    }

    #[test]
    fn test_load_files_reports_missing_file() {
        let err = GenieConfig::load_files(&[PathBuf::from("/nonexistent/synthgenie.toml")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }

    #[test]
    fn test_load_defaults() {
        // Load should work even with no config files
        let config = GenieConfig::load().unwrap();
        assert!(config.dispatch.max_prompt_length > 0);
    }
}
