use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "ccr", version, about = "Local Anthropic-to-upstream protocol-translation router")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the router's HTTP server.
    Serve(ServeArgs),
}

#[derive(Debug, Parser)]
pub struct ServeArgs {
    /// Path to the router's JSON config file.
    #[arg(long, env = "CCR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Bind host; overrides the config file and CCR_HOST.
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port; overrides the config file and CCR_PORT.
    #[arg(long)]
    pub port: Option<u16>,
}
