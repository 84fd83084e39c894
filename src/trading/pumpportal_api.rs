//! PumpPortal Trading API executor
//!
//! PumpPortal provides a simple HTTP API for executing trades on pump.fun.
//! The Lightning endpoint signs and sends with the wallet tied to the API key.
//!
//! API Documentation: https://pumpportal.fun/trading-api/
//!
//! Fee: 0.5% per trade
//! Rate limits apply - don't spam requests

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::executor::OrderExecutor;
use crate::config::ExecutorConfig;
use crate::error::{Error, Result};
use crate::token::Token;

/// PumpPortal Lightning API endpoint
pub const PUMPPORTAL_API_URL: &str = "https://pumpportal.fun/api/trade";

/// Trade action
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
}

/// Pool type for trading
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolType {
    #[default]
    Pump,
    Auto,
}

/// Trade request for Lightning API
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRequest {
    /// "buy" or "sell"
    pub action: TradeAction,
    /// Token mint address
    pub mint: String,
    /// Amount (SOL for buy, tokens or percentage for sell)
    pub amount: String,
    /// true if amount is in SOL
    pub denominated_in_sol: String,
    /// Slippage percentage (e.g., 30 for 30%)
    pub slippage: f64,
    /// Priority fee in SOL
    pub priority_fee: f64,
    /// Pool to use
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolType>,
}

/// Trade response from Lightning API
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeResponse {
    /// Transaction signature (if successful)
    pub signature: Option<String>,
    /// Error message (if failed)
    pub error: Option<String>,
    /// Additional errors
    pub errors: Option<Vec<String>>,
}

impl TradeResponse {
    /// Signature, or the API's rejection
    pub fn into_signature(self) -> Result<String> {
        if let Some(error) = self.error {
            return Err(Error::OrderRejected(error));
        }

        if let Some(errors) = self.errors {
            if !errors.is_empty() {
                return Err(Error::OrderRejected(errors.join(", ")));
            }
        }

        self.signature
            .ok_or_else(|| Error::OrderRejected("No signature in response".to_string()))
    }
}

/// Executes orders through the PumpPortal Lightning API
pub struct PumpPortalExecutor {
    client: Client,
    api_url: String,
    api_key: String,
    buy_amount_sol: f64,
    slippage_pct: f64,
    priority_fee_sol: f64,
}

impl PumpPortalExecutor {
    pub fn new(config: &ExecutorConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(Error::Config(
                "API key required for Lightning API".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: PUMPPORTAL_API_URL.to_string(),
            api_key: config.api_key.clone(),
            buy_amount_sol: config.buy_amount_sol,
            slippage_pct: config.slippage_pct,
            priority_fee_sol: config.priority_fee_sol,
        })
    }

    /// Build the request for a buy of the configured SOL amount
    pub fn buy_request(&self, token: &Token) -> TradeRequest {
        TradeRequest {
            action: TradeAction::Buy,
            mint: token.mint().to_string(),
            amount: self.buy_amount_sol.to_string(),
            denominated_in_sol: "true".to_string(),
            slippage: self.slippage_pct,
            priority_fee: self.priority_fee_sol,
            pool: Some(PoolType::Pump),
        }
    }

    /// Build the request selling the whole position
    pub fn sell_request(&self, token: &Token) -> TradeRequest {
        TradeRequest {
            action: TradeAction::Sell,
            mint: token.mint().to_string(),
            amount: "100%".to_string(),
            denominated_in_sol: "false".to_string(),
            slippage: self.slippage_pct,
            priority_fee: self.priority_fee_sol,
            pool: Some(PoolType::Pump),
        }
    }

    async fn send(&self, request: &TradeRequest) -> Result<String> {
        debug!("Sending {:?} for {}", request.action, request.mint);

        let response = self
            .client
            .post(&self.api_url)
            .query(&[("api-key", self.api_key.as_str())])
            .json(request)
            .send()
            .await
            .map_err(|e| Error::TransactionSend(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::TransactionSend(format!("PumpPortal returned {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::TransactionSend(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::OrderRejected(format!("PumpPortal returned {}: {}", status, body)));
        }

        let trade_response: TradeResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Deserialization(format!("Failed to parse response: {}", e)))?;

        trade_response.into_signature()
    }
}

#[async_trait]
impl OrderExecutor for PumpPortalExecutor {
    async fn execute_buy(&self, token: &Token) -> Result<String> {
        info!(
            "Executing buy: {} SOL for token {} ({})",
            self.buy_amount_sol,
            token.symbol,
            token.mint()
        );
        self.send(&self.buy_request(token)).await
    }

    async fn execute_sell(&self, token: &Token) -> Result<String> {
        info!("Executing sell: 100% of token {} ({})", token.symbol, token.mint());
        self.send(&self.sell_request(token)).await
    }
}
