//! Price series statistics
//!
//! Every function is pure and returns a neutral value (usually 0) on empty or
//! degenerate input instead of failing.

use chrono::{DateTime, Utc};

use crate::pump::accounts::BondingCurve;

/// Arithmetic mean, 0 for an empty series
///
/// Clamped to the sample range so summation rounding never pushes it outside.
pub fn moving_average(prices: &[f64]) -> f64 {
    if prices.is_empty() {
        return 0.0;
    }
    let mean = prices.iter().sum::<f64>() / prices.len() as f64;
    mean.max(min_price(prices)).min(max_price(prices))
}

/// Population variance around `mean`, 0 for an empty series
pub fn variance(prices: &[f64], mean: f64) -> f64 {
    if prices.is_empty() {
        return 0.0;
    }
    prices.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / prices.len() as f64
}

/// Population standard deviation (volatility)
pub fn std_dev(prices: &[f64]) -> f64 {
    // Exactly 0 for a flat series
    if prices.windows(2).all(|w| w[0] == w[1]) {
        return 0.0;
    }
    variance(prices, moving_average(prices)).sqrt()
}

/// Least-squares slope of `ys` against `xs`; 0 when undefined
fn ols_slope(xs: impl Iterator<Item = f64>, ys: &[f64]) -> f64 {
    let n = ys.len() as f64;
    if ys.is_empty() {
        return 0.0;
    }

    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_x2) = (0.0, 0.0, 0.0, 0.0);
    for (x, y) in xs.zip(ys) {
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_x2 += x * x;
    }

    let denom = n * sum_x2 - sum_x * sum_x;
    if denom == 0.0 {
        return 0.0;
    }
    (n * sum_xy - sum_x * sum_y) / denom
}

/// Regression slope of price against sample index
pub fn trend_slope(prices: &[f64]) -> f64 {
    ols_slope((0..prices.len()).map(|i| i as f64), prices)
}

/// Regression slope of price against seconds elapsed since the first sample
pub fn trend_slope_by_time(prices: &[f64], timestamps: &[DateTime<Utc>]) -> f64 {
    if prices.is_empty() || prices.len() != timestamps.len() {
        return 0.0;
    }
    let start = timestamps[0];
    let xs = timestamps
        .iter()
        .map(|t| (*t - start).num_milliseconds() as f64 / 1000.0);
    ols_slope(xs, prices)
}

/// Percent change from first to last sample; 0 if empty or first is 0
pub fn percentage_change(prices: &[f64]) -> f64 {
    match (prices.first(), prices.last()) {
        (Some(&first), Some(&last)) if first != 0.0 => (last - first) / first * 100.0,
        _ => 0.0,
    }
}

/// True when every sample is >= its predecessor; false for an empty series
pub fn is_monotonic_non_decreasing(prices: &[f64]) -> bool {
    !prices.is_empty() && prices.windows(2).all(|w| w[1] >= w[0])
}

pub fn min_price(prices: &[f64]) -> f64 {
    prices.iter().copied().reduce(f64::min).unwrap_or(0.0)
}

pub fn max_price(prices: &[f64]) -> f64 {
    prices.iter().copied().reduce(f64::max).unwrap_or(0.0)
}

/// max - min
pub fn price_spread(prices: &[f64]) -> f64 {
    max_price(prices) - min_price(prices)
}

/// real / virtual, 0 when virtual is 0
pub fn reserve_ratio(real: u64, virtual_reserves: u64) -> f64 {
    if virtual_reserves == 0 {
        return 0.0;
    }
    real as f64 / virtual_reserves as f64
}

/// Price implied by the curve's virtual token reserves and a quote-side reserve
pub fn theoretical_price(
    curve: &BondingCurve,
    quote_virtual_reserves: u64,
    quote_decimals: u8,
    token_decimals: u8,
) -> f64 {
    if curve.virtual_token_reserves == 0 {
        return 0.0;
    }
    let quote = quote_virtual_reserves as f64 / 10f64.powi(quote_decimals as i32);
    let tokens = curve.virtual_token_reserves as f64 / 10f64.powi(token_decimals as i32);
    quote / tokens
}

/// Discount to theoretical price per unit of volatility
pub fn risk_reward_score(current: f64, theoretical: f64, volatility: f64) -> f64 {
    if theoretical == 0.0 || volatility == 0.0 {
        return 0.0;
    }
    ((theoretical - current) / theoretical) / volatility
}

/// True when `current` trades at least `discount` (fraction) below `theoretical`
pub fn is_undervalued(current: f64, theoretical: f64, discount: f64) -> bool {
    if theoretical == 0.0 {
        return false;
    }
    (theoretical - current) / theoretical >= discount
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_empty_series_is_neutral() {
        let empty: [f64; 0] = [];
        assert_eq!(moving_average(&empty), 0.0);
        assert_eq!(variance(&empty, 0.0), 0.0);
        assert_eq!(std_dev(&empty), 0.0);
        assert_eq!(trend_slope(&empty), 0.0);
        assert_eq!(trend_slope_by_time(&empty, &[]), 0.0);
        assert_eq!(percentage_change(&empty), 0.0);
        assert!(!is_monotonic_non_decreasing(&empty));
        assert_eq!(min_price(&empty), 0.0);
        assert_eq!(max_price(&empty), 0.0);
        assert_eq!(price_spread(&empty), 0.0);
    }

    #[test]
    fn test_single_sample() {
        let one = [4.2];
        assert_eq!(moving_average(&one), 4.2);
        assert_eq!(std_dev(&one), 0.0);
        // n*sum_x2 - sum_x^2 == 0 for a single point
        assert_eq!(trend_slope(&one), 0.0);
        assert_eq!(percentage_change(&one), 0.0);
        assert!(is_monotonic_non_decreasing(&one));
        assert_eq!(price_spread(&one), 0.0);
    }

    #[test]
    fn test_std_dev_is_population() {
        let prices = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((moving_average(&prices) - 5.0).abs() < EPS);
        assert!((variance(&prices, 5.0) - 4.0).abs() < EPS);
        assert!((std_dev(&prices) - 2.0).abs() < EPS);
    }

    #[test]
    fn test_std_dev_constant_series() {
        assert_eq!(std_dev(&[0.1; 3]), 0.0);
        assert_eq!(std_dev(&[0.7; 5]), 0.0);
        assert_eq!(std_dev(&[0.000_000_033; 20]), 0.0);
        assert_eq!(moving_average(&[0.1; 3]), 0.1);
    }

    #[test]
    fn test_mean_within_bounds() {
        let series: [&[f64]; 5] = [
            &[0.1, 0.2, 0.3],
            &[0.1; 3],
            &[0.7, 0.7, 0.7, 0.7, 0.7],
            &[1e-8, 3.3e-8, 2.9e-8, 4.1e-8],
            &[27.9, 31.4, 35.0, 44.99, 52.3, 40.1],
        ];
        for prices in series {
            let mean = moving_average(prices);
            assert!(
                mean >= min_price(prices) && mean <= max_price(prices),
                "mean {} outside {:?}",
                mean,
                prices
            );
        }
    }

    #[test]
    fn test_trend_slope_linear_series() {
        let prices = [1.0, 3.0, 5.0, 7.0];
        assert!((trend_slope(&prices) - 2.0).abs() < EPS);

        let falling = [9.0, 6.0, 3.0];
        assert!((trend_slope(&falling) + 3.0).abs() < EPS);
    }

    #[test]
    fn test_trend_slope_by_time() {
        let start = Utc::now();
        let times = [
            start,
            start + Duration::seconds(10),
            start + Duration::seconds(20),
        ];
        let prices = [1.0, 2.0, 3.0];
        assert!((trend_slope_by_time(&prices, &times) - 0.1).abs() < EPS);

        // Same timestamp for every sample: undefined slope
        assert_eq!(trend_slope_by_time(&prices, &[start, start, start]), 0.0);
        // Length mismatch
        assert_eq!(trend_slope_by_time(&prices, &times[..2]), 0.0);
    }

    #[test]
    fn test_percentage_change() {
        assert!((percentage_change(&[2.0, 3.0]) - 50.0).abs() < EPS);
        assert!((percentage_change(&[4.0, 5.0, 2.0]) + 50.0).abs() < EPS);
        assert_eq!(percentage_change(&[0.0, 5.0]), 0.0);
    }

    #[test]
    fn test_monotonic() {
        assert!(is_monotonic_non_decreasing(&[1.0, 1.0, 2.0, 3.0]));
        assert!(!is_monotonic_non_decreasing(&[1.0, 2.0, 1.5]));
    }

    #[test]
    fn test_min_max_spread() {
        let prices = [3.0, -1.0, 8.0, 2.0];
        assert_eq!(min_price(&prices), -1.0);
        assert_eq!(max_price(&prices), 8.0);
        assert_eq!(price_spread(&prices), 9.0);
    }

    #[test]
    fn test_reserve_ratio() {
        assert_eq!(reserve_ratio(50, 100), 0.5);
        assert_eq!(reserve_ratio(50, 0), 0.0);
    }

    #[test]
    fn test_theoretical_price() {
        let curve = BondingCurve {
            virtual_token_reserves: 1_000_000_000_000_000,
            virtual_sol_reserves: 30_000_000_000,
            ..Default::default()
        };
        let price = theoretical_price(&curve, curve.virtual_sol_reserves, 9, 6);
        assert!((price - curve.price_sol()).abs() < 1e-18);

        let empty = BondingCurve::default();
        assert_eq!(theoretical_price(&empty, 30_000_000_000, 9, 6), 0.0);
    }

    #[test]
    fn test_risk_reward_score() {
        assert!((risk_reward_score(0.8, 1.0, 0.1) - 2.0).abs() < EPS);
        assert_eq!(risk_reward_score(0.8, 0.0, 0.1), 0.0);
        assert_eq!(risk_reward_score(0.8, 1.0, 0.0), 0.0);
    }

    #[test]
    fn test_is_undervalued() {
        assert!(is_undervalued(0.85, 1.0, 0.10));
        assert!(!is_undervalued(0.95, 1.0, 0.10));
        assert!(!is_undervalued(0.5, 0.0, 0.10));
    }
}
