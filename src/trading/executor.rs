//! Order executors
//!
//! The dispatcher only talks to [`OrderExecutor`]; transaction building and
//! submission live behind it.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::token::Token;

/// Executes buy and sell orders for a token
#[async_trait]
pub trait OrderExecutor: Send + Sync {
    /// Buy the configured position; returns a signature or reference id
    async fn execute_buy(&self, token: &Token) -> Result<String>;

    /// Sell the whole position; returns a signature or reference id
    async fn execute_sell(&self, token: &Token) -> Result<String>;
}

/// Logs orders without sending anything
#[derive(Default)]
pub struct DryRunExecutor {
    buys: AtomicU64,
    sells: AtomicU64,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buys(&self) -> u64 {
        self.buys.load(Ordering::Relaxed)
    }

    pub fn sells(&self) -> u64 {
        self.sells.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl OrderExecutor for DryRunExecutor {
    async fn execute_buy(&self, token: &Token) -> Result<String> {
        self.buys.fetch_add(1, Ordering::Relaxed);
        info!(
            "[DRY RUN] Would buy {} ({}) at {:.2} SOL market cap",
            token.symbol,
            token.mint(),
            token.market_cap()
        );
        Ok(format!("dry-run-{}", Uuid::new_v4()))
    }

    async fn execute_sell(&self, token: &Token) -> Result<String> {
        self.sells.fetch_add(1, Ordering::Relaxed);
        info!(
            "[DRY RUN] Would sell {} ({}) at {:.2} SOL market cap",
            token.symbol,
            token.mint(),
            token.market_cap()
        );
        Ok(format!("dry-run-{}", Uuid::new_v4()))
    }
}
