//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::analysis::AnalysisParams;
use crate::retry::RetryPolicy;
use crate::strategy::monitor::MonitorSettings;
use crate::strategy::rules::{EntryRules, ExitRules};
use crate::strategy::trader::TraderSettings;
use crate::trading::DispatcherConfig;

pub use crate::stream::backpressure::DropPolicy;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub listener: ListenerConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub trade: TradeConfig,
    #[serde(default)]
    pub orders: OrdersConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub journal: JournalConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_ws_endpoint")]
    pub ws_endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_rpc_commitment")]
    pub commitment: String,
}

/// Log-stream listener settings
#[derive(Debug, Clone, Deserialize)]
pub struct ListenerConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default)]
    pub drop_policy: DropPolicy,
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    #[serde(default = "default_listener_commitment")]
    pub commitment: String,
}

/// Candidate monitor loop
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_monitor_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_min_entry_history")]
    pub min_entry_history: usize,
    #[serde(default = "default_max_entry_history")]
    pub max_entry_history: usize,
    /// Market cap (SOL) a candidate needs for promotion
    #[serde(default = "default_entry_market_cap")]
    pub entry_market_cap: f64,
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
}

/// Active trade loop
#[derive(Debug, Clone, Deserialize)]
pub struct TradeConfig {
    #[serde(default = "default_trade_interval_secs")]
    pub interval_secs: u64,
    /// Sell once market cap (SOL) is above this
    #[serde(default = "default_exit_market_cap")]
    pub exit_market_cap: f64,
    #[serde(default = "default_min_reserve_ratio")]
    pub min_reserve_ratio: f64,
    #[serde(default = "default_stability_threshold")]
    pub stability_threshold: f64,
}

/// Order queue and worker pool
#[derive(Debug, Clone, Deserialize)]
pub struct OrdersConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Total executor attempts per order
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorMode {
    #[default]
    DryRun,
    Pumpportal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default)]
    pub mode: ExecutorMode,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_buy_amount_sol")]
    pub buy_amount_sol: f64,
    /// Slippage percent (30 = 30%)
    #[serde(default = "default_slippage_pct")]
    pub slippage_pct: f64,
    #[serde(default = "default_priority_fee_sol")]
    pub priority_fee_sol: f64,
    #[serde(default = "default_executor_timeout_ms")]
    pub timeout_ms: u64,
}

/// Audit journal
#[derive(Debug, Clone, Deserialize)]
pub struct JournalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_journal_dir")]
    pub dir: String,
}

// Default value functions
fn default_rpc_endpoint() -> String {
    std::env::var("RPC").unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".into())
}

fn default_ws_endpoint() -> String {
    std::env::var("WSS").unwrap_or_else(|_| "wss://api.mainnet-beta.solana.com".into())
}

fn default_timeout_ms() -> u64 {
    30000
}

fn default_rpc_commitment() -> String {
    "confirmed".into()
}

fn default_channel_capacity() -> usize {
    1000
}

fn default_connect_attempts() -> u32 {
    5
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_ping_interval_secs() -> u64 {
    30
}

fn default_listener_commitment() -> String {
    "processed".into()
}

fn default_monitor_interval_secs() -> u64 {
    30
}

fn default_min_entry_history() -> usize {
    2
}

fn default_max_entry_history() -> usize {
    20
}

fn default_entry_market_cap() -> f64 {
    35.0
}

fn default_fetch_concurrency() -> usize {
    8
}

fn default_trade_interval_secs() -> u64 {
    15
}

fn default_exit_market_cap() -> f64 {
    45.0
}

fn default_min_reserve_ratio() -> f64 {
    0.75
}

fn default_stability_threshold() -> f64 {
    0.000005
}

fn default_queue_capacity() -> usize {
    100
}

fn default_workers() -> usize {
    4
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_buy_amount_sol() -> f64 {
    0.004
}

fn default_slippage_pct() -> f64 {
    30.0
}

fn default_priority_fee_sol() -> f64 {
    0.00005 // 50_000 lamports
}

fn default_executor_timeout_ms() -> u64 {
    10000
}

fn default_true() -> bool {
    true
}

fn default_journal_dir() -> String {
    "trade-sessions".into()
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_rpc_endpoint(),
            ws_endpoint: default_ws_endpoint(),
            timeout_ms: default_timeout_ms(),
            commitment: default_rpc_commitment(),
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            drop_policy: DropPolicy::default(),
            connect_attempts: default_connect_attempts(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            ping_interval_secs: default_ping_interval_secs(),
            commitment: default_listener_commitment(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_monitor_interval_secs(),
            min_entry_history: default_min_entry_history(),
            max_entry_history: default_max_entry_history(),
            entry_market_cap: default_entry_market_cap(),
            fetch_concurrency: default_fetch_concurrency(),
        }
    }
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_trade_interval_secs(),
            exit_market_cap: default_exit_market_cap(),
            min_reserve_ratio: default_min_reserve_ratio(),
            stability_threshold: default_stability_threshold(),
        }
    }
}

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            workers: default_workers(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            mode: ExecutorMode::default(),
            api_key: String::new(),
            buy_amount_sol: default_buy_amount_sol(),
            slippage_pct: default_slippage_pct(),
            priority_fee_sol: default_priority_fee_sol(),
            timeout_ms: default_executor_timeout_ms(),
        }
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_journal_dir(),
        }
    }
}

/// Load `.env`, then `.env.dev` on top of it when `DEVELOPMENT=TRUE`
pub fn load_env() {
    dotenvy::dotenv().ok();

    let development = std::env::var("DEVELOPMENT")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if development && dotenvy::from_filename_override(".env.dev").is_err() {
        tracing::warn!("DEVELOPMENT=TRUE but .env.dev could not be loaded");
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("rpc.endpoint", default_rpc_endpoint())?
            .set_default("rpc.ws_endpoint", default_ws_endpoint())?
            .set_default("rpc.timeout_ms", default_timeout_ms() as i64)?
            .set_default("rpc.commitment", default_rpc_commitment())?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix TRADER_)
            .add_source(
                config::Environment::with_prefix("TRADER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.rpc.endpoint.is_empty() {
            anyhow::bail!("rpc.endpoint must be set (RPC)");
        }

        if !self.rpc.ws_endpoint.starts_with("ws://") && !self.rpc.ws_endpoint.starts_with("wss://") {
            anyhow::bail!("rpc.ws_endpoint must be a ws:// or wss:// URL");
        }

        if self.listener.channel_capacity == 0 {
            anyhow::bail!("listener.channel_capacity must be positive");
        }

        if self.listener.connect_attempts == 0 {
            anyhow::bail!("listener.connect_attempts must be at least 1");
        }

        // Validate loop timing
        if self.monitor.interval_secs == 0 || self.trade.interval_secs == 0 {
            anyhow::bail!("monitor and trade intervals must be positive");
        }

        if self.monitor.min_entry_history >= self.monitor.max_entry_history {
            anyhow::bail!(
                "min_entry_history ({}) must be below max_entry_history ({})",
                self.monitor.min_entry_history,
                self.monitor.max_entry_history
            );
        }

        if self.monitor.entry_market_cap <= 0.0 || self.trade.exit_market_cap <= 0.0 {
            anyhow::bail!("entry and exit market caps must be positive");
        }

        if !(0.0..=1.0).contains(&self.trade.min_reserve_ratio) {
            anyhow::bail!("min_reserve_ratio must be between 0 and 1");
        }

        if self.orders.queue_capacity == 0 || self.orders.workers == 0 {
            anyhow::bail!("orders.queue_capacity and orders.workers must be positive");
        }

        if self.orders.max_retries == 0 {
            anyhow::bail!("orders.max_retries must be at least 1");
        }

        // Validate trading amounts
        if self.executor.buy_amount_sol <= 0.0 {
            anyhow::bail!("buy_amount_sol must be positive");
        }

        if self.executor.slippage_pct < 0.0 || self.executor.slippage_pct > 100.0 {
            anyhow::bail!("slippage_pct must be between 0 and 100");
        }

        if self.executor.mode == ExecutorMode::Pumpportal && self.executor.api_key.is_empty() {
            anyhow::bail!("executor.api_key is required for pumpportal mode");
        }

        if self.trade.exit_market_cap <= self.monitor.entry_market_cap {
            tracing::warn!(
                "exit_market_cap ({}) is not above entry_market_cap ({}) - positions sell on the first trade tick",
                self.trade.exit_market_cap,
                self.monitor.entry_market_cap
            );
        }

        Ok(())
    }

    pub fn entry_rules(&self) -> EntryRules {
        EntryRules {
            min_entry_history: self.monitor.min_entry_history,
            max_entry_history: self.monitor.max_entry_history,
            entry_market_cap: self.monitor.entry_market_cap,
        }
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            interval: Duration::from_secs(self.monitor.interval_secs),
            fetch_concurrency: self.monitor.fetch_concurrency,
            rules: self.entry_rules(),
        }
    }

    pub fn trader_settings(&self) -> TraderSettings {
        TraderSettings {
            interval: Duration::from_secs(self.trade.interval_secs),
            fetch_concurrency: self.monitor.fetch_concurrency,
            exit: ExitRules {
                exit_market_cap: self.trade.exit_market_cap,
            },
            analysis: AnalysisParams {
                entry_market_cap: self.monitor.entry_market_cap,
                min_reserve_ratio: self.trade.min_reserve_ratio,
                stability_threshold: self.trade.stability_threshold,
            },
        }
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            queue_capacity: self.orders.queue_capacity,
            workers: self.orders.workers,
            retry: RetryPolicy::new(
                self.orders.max_retries,
                Duration::from_millis(self.orders.retry_base_delay_ms),
            ),
        }
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  RPC:
    endpoint: {}
    ws_endpoint: {}
    timeout: {}ms
    commitment: {}
  Listener:
    channel_capacity: {}
    drop_policy: {:?}
    connect_attempts: {}
  Monitor:
    interval: {}s
    entry_history: {}..{}
    entry_market_cap: {} SOL
  Trade:
    interval: {}s
    exit_market_cap: {} SOL
    min_reserve_ratio: {}
  Orders:
    queue_capacity: {}
    workers: {}
    max_retries: {}
  Executor:
    mode: {:?}
    api_key: {}
    buy_amount: {} SOL
    slippage: {}%
    priority_fee: {} SOL
  Journal:
    enabled: {}
    dir: {}
"#,
            mask_url(&self.rpc.endpoint),
            mask_url(&self.rpc.ws_endpoint),
            self.rpc.timeout_ms,
            self.rpc.commitment,
            self.listener.channel_capacity,
            self.listener.drop_policy,
            self.listener.connect_attempts,
            self.monitor.interval_secs,
            self.monitor.min_entry_history,
            self.monitor.max_entry_history,
            self.monitor.entry_market_cap,
            self.trade.interval_secs,
            self.trade.exit_market_cap,
            self.trade.min_reserve_ratio,
            self.orders.queue_capacity,
            self.orders.workers,
            self.orders.max_retries,
            self.executor.mode,
            if self.executor.api_key.is_empty() {
                "(not set)"
            } else {
                "***"
            },
            self.executor.buy_amount_sol,
            self.executor.slippage_pct,
            self.executor.priority_fee_sol,
            self.journal.enabled,
            self.journal.dir,
        )
    }
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}
