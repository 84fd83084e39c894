//! Price calculation utilities for pump.fun bonding curves
//!
//! Zero reserves yield a price of 0 rather than an error so the pipeline keeps
//! running on half-initialized curves.

use super::accounts::BondingCurve;

/// Token decimals - pump.fun uses 6 decimals (not Solana's standard 9)
pub const DEFAULT_TOKEN_DECIMALS: u8 = 6;

/// SOL decimals (lamports)
pub const SOL_DECIMALS: u8 = 9;

/// Lamports in one SOL
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

impl BondingCurve {
    /// Current token price in SOL per whole token
    /// price = (virtual_sol / 10^9) / (virtual_token / 10^6)
    pub fn price_sol(&self) -> f64 {
        if self.virtual_token_reserves == 0 || self.virtual_sol_reserves == 0 {
            return 0.0;
        }

        lamports_to_sol(self.virtual_sol_reserves)
            / tokens_to_human(self.virtual_token_reserves, DEFAULT_TOKEN_DECIMALS)
    }

    /// Market cap in SOL at the given price: price * whole-token supply
    pub fn market_cap_sol(&self, price: f64) -> f64 {
        price * tokens_to_human(self.token_total_supply, DEFAULT_TOKEN_DECIMALS)
    }
}

/// Convert lamports to SOL
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / 10f64.powi(SOL_DECIMALS as i32)
}

/// Convert SOL to lamports
pub fn sol_to_lamports(sol: f64) -> u64 {
    (sol * 10f64.powi(SOL_DECIMALS as i32)) as u64
}

/// Convert token amount to human-readable (with decimals)
pub fn tokens_to_human(amount: u64, decimals: u8) -> f64 {
    amount as f64 / 10f64.powi(decimals as i32)
}

/// Format price for display
pub fn format_price(price: f64) -> String {
    if price < 0.000001 {
        format!("{:.12}", price)
    } else if price < 0.001 {
        format!("{:.10}", price)
    } else if price < 1.0 {
        format!("{:.6}", price)
    } else {
        format!("{:.4}", price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_curve() -> BondingCurve {
        BondingCurve {
            virtual_token_reserves: 1_000_000_000_000_000, // 1B tokens
            virtual_sol_reserves: 30_000_000_000,          // 30 SOL
            real_token_reserves: 800_000_000_000_000,
            real_sol_reserves: 0,
            token_total_supply: 1_000_000_000_000_000,
            complete: false,
        }
    }

    #[test]
    fn test_price_and_market_cap() {
        let curve = test_curve();
        let price = curve.price_sol();
        // 30 SOL / 1B tokens
        assert!((price - 0.000_000_03).abs() < 1e-15);

        let market_cap = curve.market_cap_sol(price);
        assert!((market_cap - 30.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_reserves_price_is_zero() {
        let mut curve = test_curve();
        curve.virtual_token_reserves = 0;
        assert_eq!(curve.price_sol(), 0.0);
        assert_eq!(curve.market_cap_sol(curve.price_sol()), 0.0);

        let empty = BondingCurve::default();
        assert_eq!(empty.price_sol(), 0.0);
    }

    #[test]
    fn test_lamports_conversion() {
        assert_eq!(lamports_to_sol(1_000_000_000), 1.0);
        assert_eq!(sol_to_lamports(1.0), LAMPORTS_PER_SOL);
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(1.5), "1.5000");
        assert_eq!(format_price(0.5), "0.500000");
    }
}
