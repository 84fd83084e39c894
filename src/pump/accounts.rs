//! Pump.fun account structures
//!
//! # WARNING: These structures may change without notice
//! Pump.fun has modified their account layouts in the past.
//! If deserialization fails, these structures may need updating.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use super::program::ACCOUNT_DISCRIMINATORS;
use crate::error::{Error, Result};

/// Size of the fixed part of the account: discriminator, 5 x u64, bool
pub const BONDING_CURVE_LEN: usize = 8 + 8 * 5 + 1;

/// BondingCurve account - stores the bonding curve state for a token
///
/// This account holds:
/// - Virtual reserves used for price calculation
/// - Real reserves (actual SOL and tokens held)
/// - Whether the bonding curve has completed (migrated)
///
/// Newer program versions append fields after `complete`; they are ignored.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, BorshDeserialize, BorshSerialize, Serialize, Deserialize,
)]
pub struct BondingCurve {
    /// Virtual token reserves for price calculation
    pub virtual_token_reserves: u64,

    /// Virtual SOL reserves for price calculation
    /// This is larger than real_sol_reserves and affects pricing
    pub virtual_sol_reserves: u64,

    /// Real token reserves (actual tokens held in bonding curve)
    pub real_token_reserves: u64,

    /// Real SOL reserves (actual SOL held in bonding curve)
    pub real_sol_reserves: u64,

    /// Total supply of the token
    pub token_total_supply: u64,

    /// Whether the bonding curve is complete (migrated off the curve)
    pub complete: bool,
}

impl BondingCurve {
    /// Deserialize from account data, validating the discriminator
    pub fn try_from_account_data(data: &[u8]) -> Result<Self> {
        if data.len() < BONDING_CURVE_LEN {
            return Err(Error::BondingCurveDecode(format!(
                "Account data too short: {} bytes, need {}",
                data.len(),
                BONDING_CURVE_LEN
            )));
        }

        let discriminator: [u8; 8] = data[..8]
            .try_into()
            .map_err(|_| Error::BondingCurveDecode("Invalid discriminator".to_string()))?;

        if discriminator != ACCOUNT_DISCRIMINATORS::BONDING_CURVE {
            return Err(Error::BondingCurveDecode(format!(
                "Wrong discriminator: expected {:?}, got {:?}",
                ACCOUNT_DISCRIMINATORS::BONDING_CURVE,
                discriminator
            )));
        }

        <Self as BorshDeserialize>::deserialize(&mut &data[8..])
            .map_err(|e| Error::BondingCurveDecode(format!("Borsh decode failed: {}", e)))
    }

    /// Encode as account data (discriminator + fields), as the program stores it
    pub fn to_account_data(&self) -> Result<Vec<u8>> {
        let mut data = ACCOUNT_DISCRIMINATORS::BONDING_CURVE.to_vec();
        let body = borsh::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))?;
        data.extend_from_slice(&body);
        Ok(data)
    }
}

impl std::fmt::Display for BondingCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BondingCurve{{supply: {}, virtual_token: {}, real_token: {}, virtual_sol: {}, real_sol: {}, complete: {}}}",
            self.token_total_supply,
            self.virtual_token_reserves,
            self.real_token_reserves,
            self.virtual_sol_reserves,
            self.real_sol_reserves,
            self.complete
        )
    }
}
