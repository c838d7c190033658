//! SOL Screener - research automation for new Solana tokens
//!
//! Scan, score, safety-check, estimate expectation value, notify once.
//! Reference values only; the final call is always human.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

use sol_screener::cli::commands;
use sol_screener::config::Config;

/// SOL Screener - token research automation
#[derive(Parser)]
#[command(name = "screener")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "screener.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one screening cycle
    Once,

    /// Run all monitoring cycles on their schedules
    Daemon,

    /// Run one realtime monitoring pass
    Realtime,

    /// Send the daily summary report
    Report,

    /// Show persisted state counters
    Status,

    /// Show current configuration (secrets masked)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sol_screener=info".parse().unwrap()),
        )
        .with_target(true)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Once => commands::once(&config).await,
        Commands::Daemon => commands::daemon(&config).await,
        Commands::Realtime => commands::realtime(&config).await,
        Commands::Report => commands::report(&config).await,
        Commands::Status => commands::status(&config).await,
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
