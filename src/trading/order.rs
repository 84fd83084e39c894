//! Order requests and outcomes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::token::Token;

/// Reason attached to entry orders
pub const ENTRY_REASON: &str = "entry market cap met";
/// Reason attached to exit orders
pub const EXIT_REASON: &str = "above exit market cap";

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderKind::Buy => write!(f, "BUY"),
            OrderKind::Sell => write!(f, "SELL"),
        }
    }
}

/// A request for the dispatcher
#[derive(Debug)]
pub struct OrderRequest {
    pub id: Uuid,
    /// Token as it was when the order was created
    pub token: Token,
    pub kind: OrderKind,
    pub reason: String,
    /// Receives the outcome once the order completes
    pub result_tx: Option<oneshot::Sender<OrderOutcome>>,
}

impl OrderRequest {
    pub fn new(token: Token, kind: OrderKind, reason: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            token,
            kind,
            reason: reason.into(),
            result_tx: None,
        }
    }

    pub fn buy(token: Token) -> Self {
        Self::new(token, OrderKind::Buy, ENTRY_REASON)
    }

    pub fn sell(token: Token) -> Self {
        Self::new(token, OrderKind::Sell, EXIT_REASON)
    }

    /// Attach a result channel; returns the receiving end
    pub fn with_result_channel(mut self) -> (Self, oneshot::Receiver<OrderOutcome>) {
        let (tx, rx) = oneshot::channel();
        self.result_tx = Some(tx);
        (self, rx)
    }

    pub fn mint(&self) -> &Pubkey {
        self.token.mint()
    }
}

/// How an order ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderStatus {
    /// Executed; carries the signature or reference id
    Filled(String),
    Failed(String),
    /// Not executed because the same order was already taken
    Skipped(String),
}

/// Result of processing an [`OrderRequest`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderOutcome {
    pub id: Uuid,
    pub mint: Pubkey,
    pub kind: OrderKind,
    pub status: OrderStatus,
    pub attempts: u32,
    pub completed_at: DateTime<Utc>,
}

impl OrderOutcome {
    pub fn is_filled(&self) -> bool {
        matches!(self.status, OrderStatus::Filled(_))
    }
}
