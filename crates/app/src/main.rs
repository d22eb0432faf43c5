//! Courier - Main Entry Point
//!
//! Command-line front end for file-backed request collections.

mod cli;
mod commands;
mod config;

use std::process::ExitCode;

use clap::Parser;
use courier_infrastructure::open_request_store;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("COURIER_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config =
        config::store_config(|key| std::env::var(key).ok(), cli.debounce_ms, cli.settle_ms)?;
    let store = open_request_store(config);

    match cli.command {
        Commands::Init { path, name } => commands::init(&store, &path, name).await?,
        Commands::Tree { path } => commands::tree(&store, &path).await?,
        Commands::Resolve {
            path,
            request,
            env,
            vars,
        } => {
            commands::resolve(&store, &path, &request, env.as_deref(), vars.into_iter().collect())
                .await?;
        }
        Commands::Check { path } => {
            if !commands::check(&store, &path).await? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Watch { path } => commands::watch(&store, &path).await?,
    }

    Ok(ExitCode::SUCCESS)
}
