//! Backhaul Energy Manager CLI
//!
//! A command-line tool for inspecting link power states, energy usage
//! and health of a running energy manager.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{energy, health, links};

/// Backhaul Energy Manager CLI
#[derive(Parser)]
#[command(name = "bhe")]
#[command(author, version, about = "CLI for the Backhaul Energy Manager", long_about = None)]
pub struct Cli {
    /// Manager API URL (can also be set via BHE_API_URL env var)
    #[arg(long, env = "BHE_API_URL", default_value = "http://localhost:9100")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show per-link power state and utilization
    Links {
        /// Only show links in this state
        #[arg(long, value_enum)]
        state: Option<links::StateFilter>,
    },

    /// Show energy cost of recent cycles
    Energy {
        /// Number of recent cycles to list
        #[arg(long, default_value_t = 12)]
        last: usize,
    },

    /// Show component health and readiness
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let client = client::ApiClient::new(&cli.api_url)?;

    match cli.command {
        Commands::Links { state } => links::show_links(&client, state, cli.format).await?,
        Commands::Energy { last } => energy::show_energy(&client, last, cli.format).await?,
        Commands::Health => health::show_health(&client, cli.format).await?,
    }

    Ok(())
}
