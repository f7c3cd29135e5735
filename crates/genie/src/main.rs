//! genie - natural-language sound design for the Elektron Digitone
//!
//! Subcommands:
//! - `genie serve` - Run the HTTP service
//! - `genie tools` - List parameter tools
//! - `genie encode <tool> <value>` - Print the MIDI message for one tool call
//! - `genie config` - Show the effective configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use genie::{commands, serve, telemetry};
use genieconf::GenieConfig;
use genieparams::{DisplayValue, Machine};

#[derive(Parser)]
#[command(name = "genie")]
#[command(about = "Turn sound design prompts into Digitone MIDI messages")]
#[command(version)]
struct Cli {
    /// Config file, used in place of ./synthgenie.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// HTTP port to bind (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// OTLP gRPC endpoint for OpenTelemetry (e.g., "localhost:4317")
        #[arg(long)]
        otlp_endpoint: Option<String>,
    },

    /// List parameter tools
    Tools {
        /// Only tools offered for this machine (fm_tone, fm_drum, wavetone, swarmer)
        #[arg(short, long)]
        machine: Option<Machine>,
    },

    /// Print the wire JSON for one tool call
    Encode {
        /// Tool name, e.g. set_multi_mode_filter_frequency
        tool: String,

        /// Display value: a number, an option label, or "a,b" for a pair
        #[arg(allow_hyphen_values = true)]
        value: DisplayValue,

        /// MIDI channel (track), 1-16
        #[arg(short, long, default_value = "1")]
        channel: i64,
    },

    /// Show the effective configuration and its sources
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, sources) = GenieConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Serve {
            port,
            otlp_endpoint,
        } => {
            if let Some(port) = port {
                config.bind.http_port = port;
            }
            if let Some(endpoint) = otlp_endpoint {
                config.telemetry.otlp_endpoint = endpoint;
            }

            if config.telemetry.otlp_enabled() {
                telemetry::init_otlp(&config.telemetry.log_level, &config.telemetry.otlp_endpoint)?;
            } else {
                telemetry::init_console(&config.telemetry.log_level);
            }
            for file in &sources.files {
                tracing::info!(file = %file.display(), "Loaded config");
            }

            serve::run(config).await?;
        }
        Commands::Tools { machine } => {
            print!("{}", commands::list_tools(machine)?);
        }
        Commands::Encode {
            tool,
            value,
            channel,
        } => {
            println!("{}", commands::encode(&tool, value, channel)?);
        }
        Commands::Config => {
            print!("{}", commands::show_config(&config, &sources));
        }
    }

    Ok(())
}
