//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, GenieConfig};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local). Only returns files
/// that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/synthgenie/config.toml");
    if system.exists() {
        files.push(system);
    }

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("synthgenie/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("synthgenie.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read one file as a raw TOML table.
pub fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Recursively merge `overlay` into `base`. Tables merge key by key, every
/// other value in `overlay` replaces the one in `base`.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Deserialize a merged table into a config. `origin` names the source in
/// error messages.
pub fn from_table(table: toml::Table, origin: &Path) -> Result<GenieConfig, ConfigError> {
    let mut config: GenieConfig =
        toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse {
                path: origin.to_path_buf(),
                message: e.to_string(),
            })?;

    config.paths.state_dir = expand_path(&config.paths.state_dir.to_string_lossy());
    if let Some(db) = &config.paths.usage_db {
        config.paths.usage_db = Some(expand_path(&db.to_string_lossy()));
    }
    Ok(config)
}

/// Load config from a single TOML file.
pub fn load_from_file(path: &Path) -> Result<GenieConfig, ConfigError> {
    from_table(load_table(path)?, path)
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut GenieConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |key| env::var(key).ok());
}

/// Env lookups that record a variable only once its value has been applied.
struct Overrides<'a, F> {
    lookup: F,
    sources: &'a mut ConfigSources,
}

impl<F> Overrides<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn text(&mut self, key: &str) -> Option<String> {
        self.parse(key)
    }

    /// Unparsable values are ignored and not reported as overrides.
    fn parse<T: FromStr>(&mut self, key: &str) -> Option<T> {
        let value = (self.lookup)(key)?.parse().ok()?;
        self.sources.env_overrides.push(key.to_string());
        Some(value)
    }
}

/// Same as [`apply_env_overrides`] with an injectable lookup.
pub fn apply_overrides_from<F>(config: &mut GenieConfig, sources: &mut ConfigSources, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let mut env = Overrides { lookup, sources };

    // Paths
    if let Some(v) = env.text("SYNTHGENIE_STATE_DIR") {
        config.paths.state_dir = expand_path(&v);
    }
    if let Some(v) = env.text("SYNTHGENIE_USAGE_DB") {
        config.paths.usage_db = Some(expand_path(&v));
    }

    // Bind address
    if let Some(v) = env.text("SYNTHGENIE_HOST") {
        config.bind.host = v;
    }
    if let Some(port) = env.parse("SYNTHGENIE_HTTP_PORT") {
        config.bind.http_port = port;
    }

    // Telemetry
    if let Some(v) = env.text("SYNTHGENIE_OTLP_ENDPOINT") {
        config.telemetry.otlp_endpoint = v;
    }
    // Also support standard OTEL env var
    if let Some(v) = env.text("OTEL_EXPORTER_OTLP_ENDPOINT") {
        config.telemetry.otlp_endpoint = v;
    }
    if let Some(v) = env.text("SYNTHGENIE_LOG_LEVEL") {
        config.telemetry.log_level = v;
    }
    if let Some(v) = env.text("RUST_LOG") {
        config.telemetry.log_level = v;
    }

    // Model endpoint
    if let Some(v) = env.text("SYNTHGENIE_MODEL_BASE_URL") {
        config.model.base_url = v;
    }
    if let Some(v) = env.text("AGENT_MODEL") {
        config.model.model = v;
    }
    if let Some(v) = env.text("SYNTHGENIE_MODEL") {
        config.model.model = v;
    }
    if let Some(v) = env.text("SYNTHGENIE_ROUTER_MODEL") {
        config.model.router_model = Some(v);
    }
    if let Some(v) = env.text("SYNTHGENIE_CLASSIFIER_MODEL") {
        config.model.classifier_model = Some(v);
    }
    if let Some(v) = env.text("OPENAI_API_KEY") {
        config.model.api_key = Some(v);
    }
    if let Some(v) = env.text("SYNTHGENIE_MODEL_API_KEY") {
        config.model.api_key = Some(v);
    }

    // Caller credentials
    if let Some(v) = env.text("ADMIN_API_KEY") {
        config.auth.admin_api_key = Some(v);
    }
    if let Some(v) = env.text("SYNTHGENIE_ADMIN_API_KEY") {
        config.auth.admin_api_key = Some(v);
    }
    if let Some(v) = env.text("SYNTHGENIE_API_KEYS") {
        config.auth.api_keys = v
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
    }

    // Dispatch limits
    if let Some(ms) = env.parse("SYNTHGENIE_MODEL_TIMEOUT_MS") {
        config.dispatch.model_timeout_ms = ms;
    }
    if let Some(ms) = env.parse("SYNTHGENIE_ROUTING_TIMEOUT_MS") {
        config.dispatch.routing_timeout_ms = ms;
    }
    if let Some(n) = env.parse("SYNTHGENIE_MAX_MODEL_REQUESTS") {
        config.dispatch.max_model_requests = n;
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // Handle $VAR/rest/of/path
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}
