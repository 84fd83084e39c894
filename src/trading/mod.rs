//! Trading module - Order queueing and execution
//!
//! Supports two execution methods:
//! - Dry run (default, logs only)
//! - PumpPortal API (easy, 0.5% fee)

pub mod dispatcher;
pub mod executor;
pub mod order;
pub mod pumpportal_api;

pub use dispatcher::{DispatcherConfig, DispatcherStats, OrderDispatcher, OrderSubmitter};
pub use executor::{DryRunExecutor, OrderExecutor};
pub use order::{OrderKind, OrderOutcome, OrderRequest, OrderStatus};
pub use pumpportal_api::PumpPortalExecutor;
