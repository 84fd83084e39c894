//! Pump.fun protocol module
//!
//! # WARNING: Protocol Instability
//! Pump.fun has historically changed program behavior without notice.
//! The constants and structures in this module may break silently.
//! Monitor pump.fun announcements and be prepared to update.

pub mod accounts;
pub mod event;
pub mod fetcher;
pub mod price;
pub mod program;

// Re-export commonly used types
pub use accounts::BondingCurve;
pub use event::{parse_create_event, CreateEvent};
pub use fetcher::{CurveFetcher, RpcCurveFetcher};
pub use program::{associated_bonding_curve, bonding_curve_address, PUMP_PROGRAM_ID};
