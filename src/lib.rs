//! Pump.fun Trader Library
//!
//! Bonding-curve trading agent for pump.fun: discovers new tokens from the
//! program log stream, polls their curves, and buys and sells on market cap.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod journal;
pub mod pump;
pub mod registry;
pub mod retry;
pub mod strategy;
pub mod stream;
pub mod token;
pub mod trading;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use registry::TokenRegistry;
pub use token::{Snapshot, Token};
