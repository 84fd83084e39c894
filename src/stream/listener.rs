//! Event listener: log stream -> decoded tokens
//!
//! The read loop and the decoder run as separate tasks joined by a small
//! internal channel, so a slow consumer never stalls the socket read. The
//! output channel is closed exactly once, when the decoder finishes.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::backpressure::BackpressureChannel;
use super::logs::{created_tokens, LogBatch, LogSource};
use crate::token::Token;

/// Batches buffered between the read loop and the decoder
const BATCH_BUFFER: usize = 256;

/// Why the read loop stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerExit {
    Cancelled,
    EndOfStream,
    ReadError(String),
    /// Decoder stopped accepting batches
    DecoderClosed,
}

/// Counters reported when the listener stops
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerStats {
    pub batches: u64,
    pub tokens: u64,
    pub exit: ListenerExit,
}

/// Run the listener until the stream ends, fails or `cancel` fires
pub async fn run_listener<S: LogSource>(
    mut source: S,
    output: Arc<BackpressureChannel<Token>>,
    cancel: CancellationToken,
) -> ListenerStats {
    let (batch_tx, batch_rx) = mpsc::channel::<LogBatch>(BATCH_BUFFER);
    let decoder = tokio::spawn(decode_batches(batch_rx, output.clone(), cancel.clone()));

    info!("Listening for new token creations");
    let mut batches = 0u64;
    let exit = loop {
        tokio::select! {
            _ = cancel.cancelled() => break ListenerExit::Cancelled,
            next = source.next_batch() => match next {
                Ok(Some(batch)) => {
                    batches += 1;
                    if batch_tx.send(batch).await.is_err() {
                        break ListenerExit::DecoderClosed;
                    }
                }
                Ok(None) => break ListenerExit::EndOfStream,
                Err(e) => {
                    error!("Error reading log stream: {}", e);
                    break ListenerExit::ReadError(e.to_string());
                }
            }
        }
    };
    drop(batch_tx);

    let tokens = match decoder.await {
        Ok(tokens) => tokens,
        Err(e) => {
            error!("Decoder task failed: {}", e);
            // The decoder could not close the channel itself
            output.close();
            0
        }
    };

    info!(
        "Listener stopped ({:?}): {} batches, {} tokens, {} dropped",
        exit,
        batches,
        tokens,
        output.dropped_count()
    );

    ListenerStats {
        batches,
        tokens,
        exit,
    }
}

/// Decode batches into tokens and forward them; closes `output` on exit
async fn decode_batches(
    mut batch_rx: mpsc::Receiver<LogBatch>,
    output: Arc<BackpressureChannel<Token>>,
    cancel: CancellationToken,
) -> u64 {
    let mut forwarded = 0u64;

    'batches: while let Some(batch) = batch_rx.recv().await {
        for token in created_tokens(&batch) {
            tokio::select! {
                sent = output.send(token) => {
                    if sent.is_err() {
                        warn!("Token output closed, stopping decoder");
                        break 'batches;
                    }
                    forwarded += 1;
                }
                _ = cancel.cancelled() => {
                    debug!("Decoder cancelled while forwarding");
                    break 'batches;
                }
            }
        }
    }

    output.close();
    forwarded
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::stream::backpressure::DropPolicy;
    use crate::stream::logs::tests::{create_batch, test_event};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Replays scripted results, then ends or waits forever
    pub(crate) struct ScriptedSource {
        script: VecDeque<Result<Option<LogBatch>>>,
        hang_when_empty: bool,
    }

    impl ScriptedSource {
        pub(crate) fn new(script: Vec<Result<Option<LogBatch>>>) -> Self {
            Self {
                script: script.into(),
                hang_when_empty: false,
            }
        }

        pub(crate) fn hanging(script: Vec<Result<Option<LogBatch>>>) -> Self {
            Self {
                script: script.into(),
                hang_when_empty: true,
            }
        }
    }

    #[async_trait]
    impl LogSource for ScriptedSource {
        async fn next_batch(&mut self) -> Result<Option<LogBatch>> {
            match self.script.pop_front() {
                Some(item) => item,
                None if self.hang_when_empty => {
                    std::future::pending::<()>().await;
                    Ok(None)
                }
                None => Ok(None),
            }
        }
    }

    fn output() -> Arc<BackpressureChannel<Token>> {
        Arc::new(BackpressureChannel::new(16, DropPolicy::Block))
    }

    #[tokio::test]
    async fn test_forwards_tokens_and_closes_on_end_of_stream() {
        let first = test_event("First");
        let second = test_event("Second");
        let source = ScriptedSource::new(vec![
            Ok(Some(create_batch(&first))),
            Ok(Some(LogBatch::default())),
            Ok(Some(create_batch(&second))),
        ]);
        let output = output();

        let stats = run_listener(source, output.clone(), CancellationToken::new()).await;

        assert_eq!(stats.exit, ListenerExit::EndOfStream);
        assert_eq!(stats.batches, 3);
        assert_eq!(stats.tokens, 2);
        assert!(output.is_closed());
        assert!(!output.close(), "output must already be closed exactly once");

        assert_eq!(output.recv().await.unwrap().mint(), &first.mint);
        assert_eq!(output.recv().await.unwrap().mint(), &second.mint);
        assert!(output.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_read_error_stops_listener() {
        let source = ScriptedSource::new(vec![
            Ok(Some(create_batch(&test_event("Before")))),
            Err(Error::StreamDisconnected),
            Ok(Some(create_batch(&test_event("After")))),
        ]);
        let output = output();

        let stats = run_listener(source, output.clone(), CancellationToken::new()).await;

        assert!(matches!(stats.exit, ListenerExit::ReadError(_)));
        assert_eq!(stats.tokens, 1);
        assert!(output.is_closed());
    }

    #[tokio::test]
    async fn test_cancellation_stops_listener() {
        let source = ScriptedSource::hanging(vec![Ok(Some(create_batch(&test_event("One"))))]);
        let output = output();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run_listener(source, output.clone(), cancel.clone()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let stats = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.exit, ListenerExit::Cancelled);
        assert!(output.is_closed());
    }

    #[tokio::test]
    async fn test_cancel_unblocks_full_output() {
        let batches: Vec<_> = (0..4)
            .map(|i| Ok(Some(create_batch(&test_event(&format!("T{}", i))))))
            .collect();
        let source = ScriptedSource::hanging(batches);
        let output = Arc::new(BackpressureChannel::new(1, DropPolicy::Block));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run_listener(source, output.clone(), cancel.clone()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let stats = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.tokens, 1);
        assert!(output.is_closed());
    }
}
