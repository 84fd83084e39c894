//! Extraction of created tokens from program log batches

use async_trait::async_trait;
use base64::Engine;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::pump::event::parse_create_event;
use crate::pump::program::{CREATE_LOG_MARKER, EVENT_DISCRIMINATORS, PROGRAM_DATA_PREFIX};
use crate::token::Token;

/// Log lines emitted by one transaction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogBatch {
    pub signature: String,
    pub slot: u64,
    /// Transaction failed on-chain
    pub failed: bool,
    pub logs: Vec<String>,
}

/// Source of program log batches
#[async_trait]
pub trait LogSource: Send {
    /// Next batch; `Ok(None)` when the stream has ended
    async fn next_batch(&mut self) -> Result<Option<LogBatch>>;
}

/// Whether the batch contains a create instruction
pub fn is_create_batch(batch: &LogBatch) -> bool {
    batch.logs.iter().any(|line| line.contains(CREATE_LOG_MARKER))
}

/// Base64 payload of a `Program data:` line
fn program_data_payload(line: &str) -> Option<&str> {
    if !line.contains(PROGRAM_DATA_PREFIX) {
        return None;
    }
    line.split_once(": ").map(|(_, payload)| payload.trim())
}

/// Decode every token created in a batch
///
/// Batches without a create instruction, failed transactions, undecodable
/// payloads and events with an empty name yield nothing.
pub fn created_tokens(batch: &LogBatch) -> Vec<Token> {
    if batch.failed || !is_create_batch(batch) {
        return Vec::new();
    }

    let mut tokens = Vec::new();
    for payload in batch.logs.iter().filter_map(|line| program_data_payload(line)) {
        let data = match base64::engine::general_purpose::STANDARD.decode(payload) {
            Ok(data) => data,
            Err(e) => {
                warn!("Failed to decode program data in {}: {}", batch.signature, e);
                continue;
            }
        };

        // Trade events share the transaction with the create event
        if !data.starts_with(&EVENT_DISCRIMINATORS::CREATE) {
            continue;
        }

        let event = match parse_create_event(&data) {
            Ok(event) => event,
            Err(e) => {
                debug!("Dropping create event in {}: {}", batch.signature, e);
                continue;
            }
        };

        if event.name.is_empty() {
            continue;
        }

        info!(
            "New token created: {} ({}) mint={} sig={}",
            event.name, event.symbol, event.mint, batch.signature
        );
        tokens.push(Token::from_create_event(&event));
    }

    tokens
}
