//! Solana `logsSubscribe` WebSocket client
//!
//! Subscribes to logs mentioning the pump.fun program and yields one
//! [`LogBatch`] per transaction.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::logs::{LogBatch, LogSource};
use crate::error::{Error, Result};
use crate::retry::{retry_transient, RetryPolicy};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection settings for [`WsLogSource`]
#[derive(Debug, Clone)]
pub struct WsLogSourceConfig {
    pub ws_url: String,
    /// Program whose logs are streamed
    pub program: Pubkey,
    /// Commitment for the subscription (processed, confirmed, finalized)
    pub commitment: String,
    pub ping_interval_secs: u64,
}

#[derive(Debug, Deserialize)]
struct RpcMessage {
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<NotificationParams>,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct NotificationParams {
    result: LogsResult,
}

#[derive(Debug, Deserialize)]
struct LogsResult {
    context: SlotContext,
    value: LogsValue,
}

#[derive(Debug, Deserialize)]
struct SlotContext {
    slot: u64,
}

#[derive(Debug, Deserialize)]
struct LogsValue {
    signature: String,
    #[serde(default)]
    err: Option<serde_json::Value>,
    #[serde(default)]
    logs: Vec<String>,
}

/// Interpretation of one text frame
#[derive(Debug, Clone, PartialEq)]
pub enum WsMessage {
    Logs(LogBatch),
    /// Subscription confirmed with this id
    Subscribed(u64),
    RpcError(String),
    Other,
}

/// Classify a JSON-RPC text frame
pub fn parse_message(text: &str) -> Result<WsMessage> {
    let message: RpcMessage =
        serde_json::from_str(text).map_err(|e| Error::Deserialization(e.to_string()))?;

    if let Some(error) = message.error {
        return Ok(WsMessage::RpcError(error.to_string()));
    }

    if message.method.as_deref() == Some("logsNotification") {
        let Some(params) = message.params else {
            return Ok(WsMessage::Other);
        };
        let value = params.result.value;
        return Ok(WsMessage::Logs(LogBatch {
            signature: value.signature,
            slot: params.result.context.slot,
            failed: value.err.map(|e| !e.is_null()).unwrap_or(false),
            logs: value.logs,
        }));
    }

    if let Some(id) = message.result.as_ref().and_then(|r| r.as_u64()) {
        return Ok(WsMessage::Subscribed(id));
    }

    Ok(WsMessage::Other)
}

/// JSON-RPC `logsSubscribe` request for logs mentioning `program`
/// First `max_chars` characters of a message, for logging
fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

pub fn subscribe_request(program: &Pubkey, commitment: &str) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "logsSubscribe",
        "params": [
            { "mentions": [program.to_string()] },
            { "commitment": commitment }
        ]
    })
}

/// Live log stream over a Solana RPC WebSocket
pub struct WsLogSource {
    write: SplitSink<WsStream, Message>,
    read: SplitStream<WsStream>,
    ping_timer: Interval,
    subscription: Option<u64>,
}

impl WsLogSource {
    /// Connect and send the subscription
    pub async fn connect(config: &WsLogSourceConfig) -> Result<Self> {
        let url = url::Url::parse(&config.ws_url)
            .map_err(|e| Error::Config(format!("Invalid WebSocket URL: {}", e)))?;

        info!("Connecting to log stream at {}", url.host_str().unwrap_or("unknown"));
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| Error::StreamConnection(format!("WebSocket connect failed: {}", e)))?;

        let (mut write, read) = ws_stream.split();

        let request = subscribe_request(&config.program, &config.commitment);
        write
            .send(Message::Text(request.to_string()))
            .await
            .map_err(|e| Error::StreamConnection(format!("Failed to subscribe: {}", e)))?;
        info!("Subscribed to logs mentioning {}", config.program);

        let period = Duration::from_secs(config.ping_interval_secs.max(1));
        let mut ping_timer = interval_at(Instant::now() + period, period);
        ping_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Ok(Self {
            write,
            read,
            ping_timer,
            subscription: None,
        })
    }

    /// Connect, retrying transient failures with exponential backoff
    pub async fn connect_with_retry(
        config: &WsLogSourceConfig,
        attempts: u32,
        base_delay: Duration,
    ) -> Result<Self> {
        retry_transient(
            RetryPolicy::new(attempts, base_delay),
            "log stream connect",
            || Self::connect(config),
        )
        .await
    }

    /// Subscription id once the node confirmed it
    pub fn subscription(&self) -> Option<u64> {
        self.subscription
    }
}

#[async_trait]
impl LogSource for WsLogSource {
    async fn next_batch(&mut self) -> Result<Option<LogBatch>> {
        loop {
            tokio::select! {
                _ = self.ping_timer.tick() => {
                    self.write
                        .send(Message::Ping(vec![]))
                        .await
                        .map_err(|e| Error::StreamConnection(format!("Failed to send ping: {}", e)))?;
                    debug!("Sent ping");
                }

                msg = self.read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => match parse_message(&text) {
                            Ok(WsMessage::Logs(batch)) => return Ok(Some(batch)),
                            Ok(WsMessage::Subscribed(id)) => {
                                info!("Log subscription confirmed: {}", id);
                                self.subscription = Some(id);
                            }
                            Ok(WsMessage::RpcError(e)) => {
                                return Err(Error::StreamConnection(format!("Subscription rejected: {}", e)));
                            }
                            Ok(WsMessage::Other) => {
                                debug!("Unhandled message: {}", preview(&text, 100));
                            }
                            Err(e) => warn!("Failed to parse message: {}", e),
                        },
                        Some(Ok(Message::Ping(data))) => {
                            self.write
                                .send(Message::Pong(data))
                                .await
                                .map_err(|e| Error::StreamConnection(format!("Failed to send pong: {}", e)))?;
                        }
                        Some(Ok(Message::Pong(_))) => debug!("Received pong"),
                        Some(Ok(Message::Close(frame))) => {
                            info!("WebSocket closed by server: {:?}", frame);
                            return Ok(None);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!("WebSocket error: {}", e);
                            return Err(Error::StreamDisconnected);
                        }
                        None => {
                            info!("WebSocket stream ended");
                            return Ok(None);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pump::program::PUMP_PROGRAM_ID;

    #[test]
    fn test_preview_respects_char_boundaries() {
        let text = format!("{{\"name\":\"{}\"}}", "🚀狗币".repeat(60));
        let short = preview(&text, 100);
        assert_eq!(short.chars().count(), 100);
        assert!(text.starts_with(short));

        assert_eq!(preview("pong", 100), "pong");
        assert!(matches!(parse_message(&text), Ok(WsMessage::Other)));
    }

    #[test]
    fn test_subscribe_request() {
        let request = subscribe_request(&PUMP_PROGRAM_ID, "processed");
        assert_eq!(request["method"], "logsSubscribe");
        assert_eq!(
            request["params"][0]["mentions"][0],
            "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P"
        );
        assert_eq!(request["params"][1]["commitment"], "processed");
    }

    #[test]
    fn test_parse_logs_notification() {
        let text = r#"{
            "jsonrpc": "2.0",
            "method": "logsNotification",
            "params": {
                "result": {
                    "context": { "slot": 5208469 },
                    "value": {
                        "signature": "5h6xBEauJ3PK6SWCZ1PGjBvj8vDdWG3KpwATGy1ARAXFSDwt8GFXM7W5Ncn16wmqokgpiKRLuS83KUxyZyv2sUYv",
                        "err": null,
                        "logs": [
                            "Program log: Instruction: Create",
                            "Program data: AAAA"
                        ]
                    }
                },
                "subscription": 24040
            }
        }"#;

        match parse_message(text).unwrap() {
            WsMessage::Logs(batch) => {
                assert_eq!(batch.slot, 5208469);
                assert!(!batch.failed);
                assert_eq!(batch.logs.len(), 2);
                assert!(batch.signature.starts_with("5h6x"));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_parse_failed_transaction() {
        let text = r#"{"jsonrpc":"2.0","method":"logsNotification","params":{"result":{"context":{"slot":1},"value":{"signature":"s","err":{"InstructionError":[0,"Custom"]},"logs":[]}},"subscription":1}}"#;
        match parse_message(text).unwrap() {
            WsMessage::Logs(batch) => assert!(batch.failed),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_parse_subscription_ack_and_error() {
        assert_eq!(
            parse_message(r#"{"jsonrpc":"2.0","result":24040,"id":1}"#).unwrap(),
            WsMessage::Subscribed(24040)
        );
        assert!(matches!(
            parse_message(r#"{"jsonrpc":"2.0","error":{"code":-32602,"message":"Invalid params"},"id":1}"#).unwrap(),
            WsMessage::RpcError(_)
        ));
        assert!(parse_message("not json").is_err());
    }
}
