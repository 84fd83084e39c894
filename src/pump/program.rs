//! Pump.fun program constants, discriminators and address derivation
//!
//! # WARNING: These constants may change without notice
//! Pump.fun has historically modified their program behavior.
//! If parsing breaks, these values may need to be updated.
//!
//! # How discriminators are calculated
//! Anchor uses the first 8 bytes of SHA-256("<namespace>:<name>"):
//! `global:` for instructions, `account:` for accounts, `event:` for events.

use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// Pump.fun program ID
/// WARNING: This may change if pump.fun deploys a new program version
pub const PUMP_PROGRAM_ID_STR: &str = "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P";

/// SPL token program
pub const TOKEN_PROGRAM_ID_STR: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

/// SPL associated token account program
pub const ASSOCIATED_TOKEN_PROGRAM_ID_STR: &str = "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL";

/// Seed prefix of the bonding curve PDA
pub const BONDING_CURVE_SEED: &[u8] = b"bonding-curve";

lazy_static::lazy_static! {
    /// Pump.fun program ID as Pubkey
    pub static ref PUMP_PROGRAM_ID: Pubkey =
        Pubkey::from_str(PUMP_PROGRAM_ID_STR).expect("Invalid pump program ID");

    /// SPL token program ID as Pubkey
    pub static ref TOKEN_PROGRAM_ID: Pubkey =
        Pubkey::from_str(TOKEN_PROGRAM_ID_STR).expect("Invalid token program ID");

    /// Associated token account program ID as Pubkey
    pub static ref ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey =
        Pubkey::from_str(ASSOCIATED_TOKEN_PROGRAM_ID_STR)
            .expect("Invalid associated token program ID");
}

/// Log line emitted by the program when a create instruction runs
pub const CREATE_LOG_MARKER: &str = "Program log: Instruction: Create";

/// Prefix of log lines carrying base64 event data
pub const PROGRAM_DATA_PREFIX: &str = "Program data:";

/// Account discriminators (first 8 bytes of account data)
#[allow(non_snake_case)]
pub mod ACCOUNT_DISCRIMINATORS {
    /// BondingCurve account discriminator
    /// SHA-256("account:BondingCurve")[0..8], 6966180631402821399 as u64 LE
    pub const BONDING_CURVE: [u8; 8] = [23, 183, 248, 55, 96, 216, 172, 96];
}

/// Event discriminators (first 8 bytes of `Program data:` payloads)
#[allow(non_snake_case)]
pub mod EVENT_DISCRIMINATORS {
    /// SHA-256("event:CreateEvent")[0..8]
    pub const CREATE: [u8; 8] = [27, 114, 169, 77, 222, 235, 99, 118];
}

/// Calculate an Anchor discriminator, e.g. `calculate_discriminator("account", "BondingCurve")`
pub fn calculate_discriminator(namespace: &str, name: &str) -> [u8; 8] {
    use sha2::{Digest, Sha256};

    let preimage = format!("{}:{}", namespace, name);
    let hash = Sha256::digest(preimage.as_bytes());

    let mut discriminator = [0u8; 8];
    discriminator.copy_from_slice(&hash[..8]);
    discriminator
}

/// Derive the bonding curve PDA for a mint: seeds `["bonding-curve", mint]`
pub fn bonding_curve_address(mint: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[BONDING_CURVE_SEED, mint.as_ref()], &PUMP_PROGRAM_ID)
}

/// Derive the associated bonding curve: the curve's associated token account for `mint`
/// (seeds: curve, token program, mint under the associated token program).
pub fn associated_bonding_curve(mint: &Pubkey, bonding_curve: &Pubkey) -> Pubkey {
    let (address, _) = Pubkey::find_program_address(
        &[
            bonding_curve.as_ref(),
            TOKEN_PROGRAM_ID.as_ref(),
            mint.as_ref(),
        ],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    );
    address
}
