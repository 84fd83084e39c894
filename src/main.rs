//! Pump.fun Trader - bonding-curve trading agent
//!
//! # WARNING
//! - This bot trades with real money. Only use funds you can afford to lose.
//! - Most pump.fun tokens go to zero (rug pulls, abandonment).
//! - Dry-run is the default; live trading needs `executor.mode = "pumpportal"`.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

// Use the library crate
use pumpfun_trader::cli::commands;
use pumpfun_trader::config::{self, Config};

/// Pump.fun Trader - bonding-curve trading agent
#[derive(Parser)]
#[command(name = "trader")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml", env = "TRADER_CONFIG")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the trading engine
    Start {
        /// Run in dry-run mode (no real trades)
        #[arg(long)]
        dry_run: bool,
    },

    /// Show current configuration (secrets masked)
    Config,

    /// Decode a create event from a base64 `Program data:` payload
    Decode {
        /// Base64 payload, with or without the "Program data:" prefix
        payload: String,
    },

    /// Show a token's bonding curve state
    Curve {
        /// Token mint address
        mint: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env (and .env.dev in development)
    config::load_env();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pumpfun_trader=info".parse()?),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Decoding needs no configuration
    if let Commands::Decode { payload } = &cli.command {
        return commands::decode(payload);
    }

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Start { dry_run } => commands::start(&config, dry_run).await,
        Commands::Config => commands::show_config(&config),
        Commands::Curve { mint } => commands::curve(&config, &mint).await,
        Commands::Decode { .. } => Ok(()),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
