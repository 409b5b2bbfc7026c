//! CLI for the Ferry REST gateway.
//!
//! Provides commands for:
//! - gateway: Serve the REST routes, backed in-process or by a remote RPC server
//! - backend: Serve the in-memory auth-method service over RPC

mod commands;
mod config;

use clap::{Parser, Subcommand};
use commands::{backend, gateway};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ferry")]
#[command(about = "REST-to-RPC gateway for Ferry services", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the REST gateway
    Gateway(gateway::GatewayArgs),
    /// Run the RPC backend
    Backend(backend::BackendArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Gateway(args) => gateway::run(args).await,
        Commands::Backend(args) => backend::run(args).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
