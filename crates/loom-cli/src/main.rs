//! Loom CLI - manage and invoke plugins.
//!
//! Each run opens the host, which reloads every active plugin, executes one
//! command and shuts the host down again. All lifecycle and invocation
//! rules live in `loom-plugins`; this binary only parses and prints.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use loom_config::Config;
use loom_plugins::{PluginId, PluginTarget};
use loom_telemetry::{LogConfig, setup_logging};

mod commands;
mod host;
mod output;
mod theme;

use output::Output;

/// Loom - dynamic plugin host
#[derive(Parser)]
#[command(name = "loom")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Extra configuration file, applied over ~/.loom/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Home directory for artifacts and state (default: ~/.loom)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Log level, overriding the configuration
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store an artifact and register it as an inactive plugin
    Upload {
        /// Path to a `.wasm` module or a plugin bundle
        file: PathBuf,
        /// Name to register until the plugin reports its own
        #[arg(long)]
        name: Option<String>,
    },

    /// Load and start a plugin
    Activate {
        /// Plugin id
        id: PluginId,
    },

    /// Stop a plugin after its in-flight calls finish
    Deactivate {
        /// Plugin id
        id: PluginId,
    },

    /// Delete an inactive plugin and its artifact
    Remove {
        /// Plugin id
        id: PluginId,
    },

    /// List registered plugins
    List,

    /// Show one plugin's record
    Show {
        /// Plugin id
        id: PluginId,
    },

    /// List every invocable method
    Methods {
        /// Plugin id
        id: PluginId,
    },

    /// List the methods exposed on the safe surface
    SafeMethods {
        /// Plugin id
        id: PluginId,
    },

    /// Run a plugin's text entry point
    Exec {
        /// Plugin id
        id: PluginId,
        /// Input text
        text: String,
    },

    /// Invoke any method
    Invoke {
        /// Plugin id
        id: PluginId,
        /// Method name
        method: String,
        /// Arguments, parsed as JSON where possible
        #[arg(allow_negative_numbers = true)]
        args: Vec<String>,
    },

    /// Invoke a method exposed on the safe surface
    SafeInvoke {
        /// Plugin id
        id: PluginId,
        /// Method name
        method: String,
        /// Arguments, parsed as JSON where possible
        #[arg(allow_negative_numbers = true)]
        args: Vec<String>,
    },

    /// Invoke a plugin by id or by name
    Call {
        /// Plugin id or display name
        target: PluginTarget,
        /// Method name (default: execute)
        #[arg(long)]
        method: Option<String>,
        /// Arguments, parsed as JSON where possible
        #[arg(allow_negative_numbers = true)]
        args: Vec<String>,
    },

    /// Send a JSON request, e.g. '{"type":"call","method":"add","args":[1,2]}'
    Request {
        /// Plugin id
        id: PluginId,
        /// The request
        request: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref(), cli.home.as_deref())
        .context("failed to load configuration")?;
    if let Some(level) = &cli.log_level {
        config.logging.level.clone_from(level);
    }

    match LogConfig::try_from(&config.logging) {
        Ok(log_config) => {
            if let Err(e) = setup_logging(&log_config) {
                eprintln!("Failed to initialize logging: {e}");
            }
        },
        Err(e) => eprintln!("Invalid logging configuration: {e}"),
    }

    let out = if cli.json { Output::Json } else { Output::Human };
    let host = host::Host::open(&config).await?;
    let result = commands::run(&host.registry, cli.command, out).await;
    host.close().await;
    result
}
