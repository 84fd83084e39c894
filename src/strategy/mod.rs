//! Trading strategy
//!
//! - `rules` - Entry, eviction and exit predicates
//! - `monitor` - Candidate polling, promotion and eviction
//! - `trader` - Active token polling and order emission
//! - `engine` - Task orchestration and shutdown

pub mod engine;
pub mod monitor;
pub mod rules;
pub mod trader;

pub use engine::{Engine, EngineStats, ShutdownReport};
pub use monitor::{Monitor, MonitorReport, MonitorSettings};
pub use rules::{EntryRules, ExitRules};
pub use trader::{Trader, TraderReport, TraderSettings};
