//! CLI command implementations

use anyhow::{Context, Result};
use base64::Engine as _;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::analysis::stats::reserve_ratio;
use crate::config::{Config, ExecutorMode};
use crate::journal::{AuditSink, NullJournal, SessionJournal};
use crate::pump::price::{format_price, lamports_to_sol};
use crate::pump::program::PROGRAM_DATA_PREFIX;
use crate::pump::{
    associated_bonding_curve, bonding_curve_address, parse_create_event, CreateEvent,
    CurveFetcher, RpcCurveFetcher,
};
use crate::strategy::Engine;
use crate::token::Snapshot;
use crate::trading::{DryRunExecutor, OrderExecutor, PumpPortalExecutor};

/// Start the trading engine
pub async fn start(config: &Config, dry_run: bool) -> Result<()> {
    let dry_run = dry_run || config.executor.mode == ExecutorMode::DryRun;
    if dry_run {
        warn!("Running in DRY-RUN mode - no real trades will be executed");
    }

    info!("Starting pump.fun trader...");
    info!(
        "Buy amount: {} SOL, Slippage: {}%, Entry: {} SOL mcap, Exit: {} SOL mcap",
        config.executor.buy_amount_sol,
        config.executor.slippage_pct,
        config.monitor.entry_market_cap,
        config.trade.exit_market_cap
    );

    info!("Initializing RPC client...");
    let fetcher: Arc<dyn CurveFetcher> = Arc::new(RpcCurveFetcher::new(&config.rpc)?);

    let executor: Arc<dyn OrderExecutor> = if dry_run {
        Arc::new(DryRunExecutor::new())
    } else {
        info!("Using PumpPortal Lightning API (0.5% fee)");
        Arc::new(PumpPortalExecutor::new(&config.executor)?)
    };

    let journal: Arc<dyn AuditSink> = if config.journal.enabled {
        Arc::new(
            SessionJournal::create(&config.journal.dir)
                .context("Failed to create audit journal session")?,
        )
    } else {
        info!("Audit journal disabled");
        Arc::new(NullJournal)
    };

    let mut engine = Engine::new(config.clone(), fetcher, executor, journal);
    engine
        .start_live()
        .await
        .context("Failed to connect to the log stream")?;

    let cancel = engine.cancel_token();
    tokio::select! {
        _ = shutdown_signal() => info!("Received shutdown signal"),
        _ = cancel.cancelled() => {}
    }

    let report = engine.shutdown().await;
    if let Some(orders) = report.orders {
        info!(
            "Orders: {} filled, {} failed, {} skipped",
            orders.filled, orders.failed, orders.skipped
        );
    }

    Ok(())
}

/// Ctrl-C, or SIGTERM on Unix
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Show configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

/// Decode a create event payload (base64, optionally with the log prefix)
pub fn decode_payload(input: &str) -> Result<CreateEvent> {
    let encoded = input.trim();
    let encoded = encoded.strip_prefix(PROGRAM_DATA_PREFIX).unwrap_or(encoded).trim();

    let data = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .context("Payload is not valid base64")?;

    parse_create_event(&data).context("Payload is not a create event")
}

/// Print a decoded create event
pub fn decode(input: &str) -> Result<()> {
    let event = decode_payload(input)?;

    println!("\n=== CREATE EVENT ===\n");
    println!("Name:          {}", event.name);
    println!("Symbol:        {}", event.symbol);
    println!("URI:           {}", event.uri);
    println!("Mint:          {}", event.mint);
    println!("Bonding curve: {}", event.bonding_curve);
    println!(
        "Associated:    {}",
        associated_bonding_curve(&event.mint, &event.bonding_curve)
    );
    println!("Creator:       {}", event.user);
    Ok(())
}

/// Fetch and print a token's bonding curve state
pub async fn curve(config: &Config, mint: &str) -> Result<()> {
    let mint = Pubkey::from_str(mint).context("Invalid mint address")?;
    let (bonding_curve, _) = bonding_curve_address(&mint);

    let fetcher = RpcCurveFetcher::new(&config.rpc)?;
    let state = fetcher
        .fetch(&bonding_curve)
        .await
        .with_context(|| format!("Failed to fetch bonding curve {}", bonding_curve))?;
    let snapshot = Snapshot::from_curve(state, chrono::Utc::now());

    println!("\n=== BONDING CURVE ===\n");
    println!("Mint:                {}", mint);
    println!("Bonding curve:       {}", bonding_curve);
    println!(
        "Associated curve:    {}",
        associated_bonding_curve(&mint, &bonding_curve)
    );
    println!("{}", state);
    println!("Price:               {} SOL", format_price(snapshot.price));
    println!("Market cap:          {:.4} SOL", snapshot.market_cap);
    println!(
        "Real SOL reserves:   {:.4} SOL",
        lamports_to_sol(state.real_sol_reserves)
    );
    println!(
        "Token reserve ratio: {:.4}",
        reserve_ratio(state.real_token_reserves, state.virtual_token_reserves)
    );
    println!(
        "Complete:            {}",
        if state.complete { "yes (migrated)" } else { "no" }
    );
    Ok(())
}
