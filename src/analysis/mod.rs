//! Token analysis - statistics over a token's snapshot history

pub mod analyzer;
pub mod stats;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use analyzer::{analyze, AnalysisParams};

/// Result of evaluating a token's history at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Analysis {
    /// Latest market cap >= entry threshold
    pub has_sufficient_market_cap: bool,
    /// Token reserve ratio >= minimum
    pub has_sufficient_reserves: bool,
    pub data_points: usize,

    /// real / virtual token reserves
    pub token_reserve_ratio: f64,
    /// real / virtual SOL reserves
    pub sol_reserve_ratio: f64,

    /// Volatility below the stability threshold
    pub is_price_stable: bool,
    pub price_spread: f64,
    pub moving_average: f64,
    pub percentage_change: f64,
    pub trend_slope: f64,
    pub trend_slope_by_time: f64,
    pub is_trending_up: bool,

    pub volatility: f64,
    pub theoretical_price: f64,
    pub current_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub risk_reward_score: f64,

    /// Observation time of the latest snapshot analyzed
    pub timestamp: DateTime<Utc>,
}

impl std::fmt::Display for Analysis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Analysis{{mcap_ok: {}, reserves_ok: {}, points: {}, reserve_ratio: {:.4}, sol_reserve_ratio: {:.4}, \
             stable: {}, spread: {:.10}, sma: {:.10}, change: {:.3}%, slope: {:.10}, trending_up: {}, \
             volatility: {:.10}, theoretical: {:.10}, current: {:.10}, risk_reward: {:.8}, time: {}}}",
            self.has_sufficient_market_cap,
            self.has_sufficient_reserves,
            self.data_points,
            self.token_reserve_ratio,
            self.sol_reserve_ratio,
            self.is_price_stable,
            self.price_spread,
            self.moving_average,
            self.percentage_change,
            self.trend_slope,
            self.is_trending_up,
            self.volatility,
            self.theoretical_price,
            self.current_price,
            self.risk_reward_score,
            self.timestamp.to_rfc3339()
        )
    }
}
