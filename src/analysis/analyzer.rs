//! Builds an [`Analysis`] from a token's snapshot history

use super::stats;
use super::Analysis;
use crate::pump::price::{DEFAULT_TOKEN_DECIMALS, SOL_DECIMALS};
use crate::token::Token;

/// Thresholds used when flagging an analysis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisParams {
    /// Minimum market cap (SOL) considered sufficient
    pub entry_market_cap: f64,
    /// Minimum real/virtual token reserve ratio
    pub min_reserve_ratio: f64,
    /// Volatility below this counts as stable
    pub stability_threshold: f64,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            entry_market_cap: 35.0,
            min_reserve_ratio: 0.75,
            stability_threshold: 0.000005,
        }
    }
}

/// Analyze a token's full history; the default analysis if it has none
pub fn analyze(token: &Token, params: &AnalysisParams) -> Analysis {
    let Some(latest) = token.latest() else {
        return Analysis::default();
    };

    let prices = token.prices();
    let timestamps = token.timestamps();
    let curve = &latest.curve;

    let volatility = stats::std_dev(&prices);
    let token_reserve_ratio =
        stats::reserve_ratio(curve.real_token_reserves, curve.virtual_token_reserves);
    let theoretical_price = stats::theoretical_price(
        curve,
        curve.virtual_sol_reserves,
        SOL_DECIMALS,
        DEFAULT_TOKEN_DECIMALS,
    );

    Analysis {
        has_sufficient_market_cap: latest.market_cap >= params.entry_market_cap,
        has_sufficient_reserves: token_reserve_ratio >= params.min_reserve_ratio,
        data_points: prices.len(),
        token_reserve_ratio,
        sol_reserve_ratio: stats::reserve_ratio(curve.real_sol_reserves, curve.virtual_sol_reserves),
        is_price_stable: volatility < params.stability_threshold,
        price_spread: stats::price_spread(&prices),
        moving_average: stats::moving_average(&prices),
        percentage_change: stats::percentage_change(&prices),
        trend_slope: stats::trend_slope(&prices),
        trend_slope_by_time: stats::trend_slope_by_time(&prices, &timestamps),
        is_trending_up: stats::is_monotonic_non_decreasing(&prices),
        volatility,
        theoretical_price,
        current_price: latest.price,
        min_price: stats::min_price(&prices),
        max_price: stats::max_price(&prices),
        risk_reward_score: stats::risk_reward_score(latest.price, theoretical_price, volatility),
        timestamp: latest.observed_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tests::{curve_with_market_cap, test_token};
    use crate::token::Snapshot;
    use chrono::{Duration, Utc};

    #[test]
    fn test_analyze_without_history_is_default() {
        let token = test_token();
        assert_eq!(analyze(&token, &AnalysisParams::default()), Analysis::default());
    }

    #[test]
    fn test_analyze_rising_history() {
        let mut token = test_token();
        let start = Utc::now();
        for (i, mcap) in [30.0, 33.0, 36.0, 40.0].into_iter().enumerate() {
            token
                .push_snapshot(Snapshot::from_curve(
                    curve_with_market_cap(mcap),
                    start + Duration::seconds(15 * i as i64),
                ))
                .unwrap();
        }

        let analysis = analyze(&token, &AnalysisParams::default());
        assert_eq!(analysis.data_points, 4);
        assert!(analysis.has_sufficient_market_cap);
        assert!(analysis.is_trending_up);
        assert!(analysis.trend_slope > 0.0);
        assert!(analysis.trend_slope_by_time > 0.0);
        assert!(analysis.percentage_change > 0.0);
        assert_eq!(analysis.current_price, token.price());
        assert_eq!(analysis.max_price, token.price());
        assert_eq!(analysis.timestamp, start + Duration::seconds(45));
        // real/virtual = 0.8
        assert!((analysis.token_reserve_ratio - 0.8).abs() < 1e-12);
        assert!(analysis.has_sufficient_reserves);
        assert!((analysis.sol_reserve_ratio - 0.5).abs() < 1e-9);
        // Theoretical price equals curve price, so no discount
        assert!(analysis.risk_reward_score.abs() < 1e-6);
    }

    #[test]
    fn test_analyze_is_deterministic() {
        let mut token = test_token();
        token
            .push_snapshot(Snapshot::from_curve(curve_with_market_cap(20.0), Utc::now()))
            .unwrap();

        let params = AnalysisParams::default();
        let first = analyze(&token, &params);
        assert_eq!(first, analyze(&token, &params));
        assert!(!first.has_sufficient_market_cap);
        // Single point: no volatility
        assert!(first.is_price_stable);
    }

    #[test]
    fn test_zero_reserves_do_not_fail() {
        let mut token = test_token();
        token
            .push_snapshot(Snapshot::from_curve(Default::default(), Utc::now()))
            .unwrap();

        let analysis = analyze(&token, &AnalysisParams::default());
        assert_eq!(analysis.current_price, 0.0);
        assert_eq!(analysis.theoretical_price, 0.0);
        assert_eq!(analysis.token_reserve_ratio, 0.0);
        assert!(!analysis.has_sufficient_reserves);
    }
}
