//! Switchyard - Capability-Driven Agent Dispatcher
//!
//! CLI entry point.

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;
mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = cli::Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "switchyard=info,switchyard_core=info".into());
    // Logs go to stderr; stdout carries command output
    if cli.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    debug!("Starting Switchyard v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = cli::run(cli).await {
        if let Some(core) = e.downcast_ref::<switchyard_core::Error>() {
            eprintln!("{}", switchyard_core::format_error_for_cli(core));
        }
        return Err(e);
    }
    Ok(())
}
