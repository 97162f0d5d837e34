//! CLI module for Switchyard
//!
//! Provides commands:
//! - `route`: Route one request through the dispatcher
//! - `agents`: Show the agent catalog and directory stats
//! - `health`: Probe every agent and print its status

use clap::{Parser, Subcommand};

pub mod agents;
pub mod health;
pub mod route;

/// Switchyard agent dispatcher CLI
#[derive(Parser, Debug)]
#[command(name = "switchyard")]
#[command(about = "Capability-driven dispatch to backend agents")]
#[command(version)]
pub struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Route a request to agents
    Route(route::RouteArgs),
    /// List registered agents
    Agents,
    /// Probe agent health
    Health,
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Route(args)) => route::run(args).await,
        Some(Commands::Agents) => agents::run().await,
        Some(Commands::Health) => health::run().await,
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}
