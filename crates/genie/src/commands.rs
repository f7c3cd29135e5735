//! Offline CLI commands: inspect tools, encode values, show config.

use anyhow::{Context, Result};
use genieconf::{ConfigSources, GenieConfig};
use genieparams::{DisplayValue, Machine, ParameterCatalog, ToolArgs, ToolRegistry};

fn registry() -> Result<ToolRegistry> {
    let catalog = ParameterCatalog::digitone().context("Parameter catalog is inconsistent")?;
    Ok(ToolRegistry::from_catalog(&catalog))
}

/// One line per tool: name, then description.
pub fn list_tools(machine: Option<Machine>) -> Result<String> {
    let registry = registry()?;
    let infos = registry.infos(machine);

    let width = infos.iter().map(|i| i.name.len()).max().unwrap_or(0);
    let mut out = String::new();
    for info in &infos {
        out.push_str(&format!("{:width$}  {}\n", info.name, info.description, width = width));
    }
    out.push_str(&format!("\n{} tools\n", infos.len()));
    Ok(out)
}

/// Wire JSON for a single tool call.
pub fn encode(tool: &str, value: DisplayValue, channel: i64) -> Result<String> {
    let registry = registry()?;
    let spec = registry
        .get(tool)
        .with_context(|| format!("Unknown tool: {}", tool))?;

    let msg = spec
        .call(&ToolArgs {
            value,
            midi_channel: channel,
        })
        .with_context(|| format!("{} rejected the value", tool))?;

    serde_json::to_string_pretty(&msg).context("Failed to serialize message")
}

/// Effective configuration followed by where it came from.
pub fn show_config(config: &GenieConfig, sources: &ConfigSources) -> String {
    let mut out = config.to_toml();

    out.push_str("\n# Sources\n");
    if sources.files.is_empty() {
        out.push_str("#   (no config files, defaults only)\n");
    }
    for file in &sources.files {
        out.push_str(&format!("#   file: {}\n", file.display()));
    }
    for var in &sources.env_overrides {
        out.push_str(&format!("#   env: {}\n", var));
    }
    out
}
