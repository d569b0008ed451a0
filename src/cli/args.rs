use crate::domain::config::EngineKind;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Command line arguments for Cube
#[derive(Parser, Debug)]
#[command(
    name = "cube",
    version = env!("CARGO_PKG_VERSION"),
    about = "Container session orchestration service",
    long_about = "Provisions short-lived container sessions with leased host ports, tracks their lifecycle and reclaims ports and containers on teardown."
)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Container engine (overrides engine.kind)
    #[arg(short, long, value_enum, global = true)]
    pub engine: Option<EngineArg>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the session HTTP service
    Serve(ServeArgs),
    /// List images known to the engine
    Images,
    /// List containers known to the engine
    Containers,
    /// Configuration management commands
    Config(ConfigArgs),
    /// Display version information
    Version,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
    /// Table output
    Table,
    /// CSV output
    Csv,
}

/// Engine selection
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineArg {
    /// Docker daemon
    Docker,
    /// In-process engine without a real runtime
    Simulated,
}

impl From<EngineArg> for EngineKind {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Docker => EngineKind::Docker,
            EngineArg::Simulated => EngineKind::Simulated,
        }
    }
}

/// HTTP service arguments
#[derive(ClapArgs, Debug, Default)]
pub struct ServeArgs {
    /// Bind address (overrides server.bind)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Listen port (overrides server.port)
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Configuration management arguments
#[derive(ClapArgs, Debug)]
pub struct ConfigArgs {
    /// Configuration subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Validate a configuration file
    Validate {
        /// Configuration file (defaults to the effective configuration)
        file: Option<String>,
    },
    /// Write a default configuration file
    Init {
        /// Directory to create `.cube/config.toml` in
        #[arg(short, long)]
        output: Option<String>,
        /// Write the global configuration instead
        #[arg(short, long)]
        global: bool,
    },
}
