//! Entry and exit rules
//!
//! Pure predicates over a token's latest state, shared by the monitor and
//! trade loops.

use crate::token::Token;
use crate::trading::OrderKind;

/// Candidate promotion/eviction thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryRules {
    /// Snapshots required before a candidate can be promoted
    pub min_entry_history: usize,
    /// Snapshots after which a low-cap candidate is dropped
    pub max_entry_history: usize,
    /// Market cap (SOL) needed for entry
    pub entry_market_cap: f64,
}

impl Default for EntryRules {
    fn default() -> Self {
        Self {
            min_entry_history: 2,
            max_entry_history: 20,
            entry_market_cap: 35.0,
        }
    }
}

/// Position exit threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitRules {
    /// Sell once market cap (SOL) is strictly above this
    pub exit_market_cap: f64,
}

impl Default for ExitRules {
    fn default() -> Self {
        Self {
            exit_market_cap: 45.0,
        }
    }
}

/// Candidate has been watched long enough without reaching entry
pub fn should_evict(token: &Token, rules: &EntryRules) -> bool {
    token.history_len() > rules.max_entry_history && token.market_cap() < rules.entry_market_cap
}

/// Candidate qualifies for ActiveTrades
pub fn should_promote(token: &Token, rules: &EntryRules) -> bool {
    token.history_len() > rules.min_entry_history
        && token.market_cap() >= rules.entry_market_cap
        && !token.trading
}

pub fn should_buy(token: &Token) -> bool {
    !token.trading
}

pub fn should_sell(token: &Token, rules: &ExitRules) -> bool {
    token.trading && !token.sold && token.market_cap() > rules.exit_market_cap
}

/// Order the trade loop should submit for an active token, if any
pub fn trade_signal(token: &Token, rules: &ExitRules) -> Option<OrderKind> {
    if should_buy(token) {
        Some(OrderKind::Buy)
    } else if should_sell(token, rules) {
        Some(OrderKind::Sell)
    } else {
        None
    }
}
