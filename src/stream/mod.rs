//! Stream module - token discovery from the pump.fun log stream
//!
//! - `websocket`: `logsSubscribe` client producing log batches
//! - `logs`: create-event extraction from a batch
//! - `listener`: read loop + decoder feeding the engine
//! - `backpressure`: bounded output channel with drop policies

pub mod backpressure;
pub mod listener;
pub mod logs;
pub mod websocket;

pub use backpressure::{BackpressureChannel, DropPolicy};
pub use listener::{run_listener, ListenerExit, ListenerStats};
pub use logs::{created_tokens, LogBatch, LogSource};
pub use websocket::{WsLogSource, WsLogSourceConfig};
