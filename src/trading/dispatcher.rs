//! Order dispatcher
//!
//! A bounded queue of [`OrderRequest`]s drained by a fixed pool of workers.
//! Each worker claims the order on the token's ActiveTrades entry, calls the
//! executor with bounded retry and records the result in the audit journal.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::executor::OrderExecutor;
use super::order::{OrderKind, OrderOutcome, OrderRequest, OrderStatus};
use crate::error::{Error, Result};
use crate::journal::{AuditSink, ORDERS_CHANNEL};
use crate::registry::TokenRegistry;
use crate::retry::{retry_transient, RetryPolicy};

/// Dispatcher sizing and retry settings
#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    pub queue_capacity: usize,
    pub workers: usize,
    pub retry: RetryPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            workers: 4,
            retry: RetryPolicy::new(5, Duration::from_millis(500)),
        }
    }
}

/// Cloneable handle for queueing orders
#[derive(Clone)]
pub struct OrderSubmitter {
    tx: async_channel::Sender<OrderRequest>,
}

impl OrderSubmitter {
    /// Queue an order, waiting for space
    pub async fn submit(&self, request: OrderRequest) -> Result<()> {
        self.tx.send(request).await.map_err(|_| Error::QueueClosed)
    }

    /// Queue an order without waiting
    pub fn try_submit(&self, request: OrderRequest) -> Result<()> {
        self.tx.try_send(request).map_err(|e| match e {
            async_channel::TrySendError::Full(_) => Error::QueueFull,
            async_channel::TrySendError::Closed(_) => Error::QueueClosed,
        })
    }

    /// Orders waiting in the queue
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

/// Counts of processed orders
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    pub filled: u64,
    pub failed: u64,
    pub skipped: u64,
}

#[derive(Default)]
struct Counters {
    filled: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

impl Counters {
    fn record(&self, status: &OrderStatus) {
        let counter = match status {
            OrderStatus::Filled(_) => &self.filled,
            OrderStatus::Failed(_) => &self.failed,
            OrderStatus::Skipped(_) => &self.skipped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            filled: self.filled.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// Worker pool executing queued orders
pub struct OrderDispatcher {
    config: DispatcherConfig,
    tx: async_channel::Sender<OrderRequest>,
    rx: async_channel::Receiver<OrderRequest>,
    worker: Worker,
}

impl OrderDispatcher {
    pub fn new(
        config: DispatcherConfig,
        executor: Arc<dyn OrderExecutor>,
        active: Arc<TokenRegistry>,
        closed: Arc<TokenRegistry>,
        journal: Arc<dyn AuditSink>,
    ) -> Self {
        let (tx, rx) = async_channel::bounded(config.queue_capacity.max(1));
        Self {
            config,
            tx,
            rx,
            worker: Worker {
                executor,
                active,
                closed,
                journal,
                retry: config.retry,
                counters: Arc::new(Counters::default()),
            },
        }
    }

    pub fn submitter(&self) -> OrderSubmitter {
        OrderSubmitter { tx: self.tx.clone() }
    }

    /// Run the worker pool until cancelled or every submitter is dropped
    ///
    /// On cancellation queued orders are left unprocessed; orders already
    /// being executed finish first.
    pub async fn run(self, cancel: CancellationToken) -> DispatcherStats {
        let workers = self.config.workers.max(1);
        info!(
            "Order dispatcher started: {} workers, queue capacity {}",
            workers, self.config.queue_capacity
        );

        // Only submitters keep the queue open from here on
        drop(self.tx);

        let handles: Vec<_> = (0..workers)
            .map(|id| {
                let worker = self.worker.clone();
                let rx = self.rx.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move { worker.run(id, rx, cancel).await })
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!("Order worker panicked: {}", e);
            }
        }

        let stats = self.worker.counters.stats();
        info!(
            "Order dispatcher stopped: {} filled, {} failed, {} skipped",
            stats.filled, stats.failed, stats.skipped
        );
        stats
    }
}

#[derive(Clone)]
struct Worker {
    executor: Arc<dyn OrderExecutor>,
    active: Arc<TokenRegistry>,
    closed: Arc<TokenRegistry>,
    journal: Arc<dyn AuditSink>,
    retry: RetryPolicy,
    counters: Arc<Counters>,
}

impl Worker {
    async fn run(
        self,
        id: usize,
        rx: async_channel::Receiver<OrderRequest>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Order worker {} cancelled", id);
                    break;
                }
                request = rx.recv() => match request {
                    Ok(request) => self.process(request).await,
                    Err(_) => {
                        debug!("Order queue closed, worker {} exiting", id);
                        break;
                    }
                }
            }
        }
    }

    async fn process(&self, mut request: OrderRequest) {
        let kind = request.kind;
        let mint = *request.mint();

        // Claim the order; an already-set flag means a duplicate request
        let already_claimed = self.active.update(&mint, |token| match kind {
            OrderKind::Buy => std::mem::replace(&mut token.trading, true),
            OrderKind::Sell => {
                let was_sold = token.sold;
                token.mark_sold();
                was_sold
            }
        });

        let (status, attempts) = if already_claimed == Some(true) {
            debug!("{} for {} already in progress, skipping", kind, mint);
            (OrderStatus::Skipped(format!("{} already issued", kind)), 0)
        } else {
            self.audit(&request, "SUBMITTED", &request.reason, 0);
            self.execute(&request).await
        };

        match &status {
            OrderStatus::Filled(signature) => {
                info!("{} {} ({}) filled: {}", kind, request.token.symbol, mint, signature);
                self.audit(&request, "FILLED", signature, attempts);
                if kind == OrderKind::Sell {
                    self.archive(&request);
                }
            }
            OrderStatus::Failed(reason) => {
                warn!("{} {} ({}) failed after {} attempts: {}", kind, request.token.symbol, mint, attempts, reason);
                self.audit(&request, "FAILED", reason, attempts);
                self.active.update(&mint, |token| match kind {
                    OrderKind::Buy => token.trading = false,
                    OrderKind::Sell => token.sold = false,
                });
            }
            OrderStatus::Skipped(reason) => {
                self.audit(&request, "SKIPPED", reason, attempts);
            }
        }
        self.journal.flush(ORDERS_CHANNEL);
        self.counters.record(&status);

        if let Some(result_tx) = request.result_tx.take() {
            let outcome = OrderOutcome {
                id: request.id,
                mint,
                kind,
                status,
                attempts,
                completed_at: Utc::now(),
            };
            if result_tx.send(outcome).is_err() {
                debug!("Outcome receiver for {} dropped", request.id);
            }
        }
    }

    async fn execute(&self, request: &OrderRequest) -> (OrderStatus, u32) {
        let executor = &self.executor;
        let token = &request.token;
        let kind = request.kind;
        let what = format!("{} {}", kind, token.mint());

        let mut attempts = 0u32;
        let result = retry_transient(self.retry, &what, || {
            attempts += 1;
            async move {
                match kind {
                    OrderKind::Buy => executor.execute_buy(token).await,
                    OrderKind::Sell => executor.execute_sell(token).await,
                }
            }
        })
        .await;

        match result {
            Ok(signature) => (OrderStatus::Filled(signature), attempts),
            Err(e) => (OrderStatus::Failed(e.to_string()), attempts),
        }
    }

    /// Move a sold token from ActiveTrades into Closed
    fn archive(&self, request: &OrderRequest) {
        let mut token = self
            .active
            .remove(request.mint())
            .unwrap_or_else(|| request.token.clone());
        token.mark_sold();
        self.closed.set(token);
        debug!("Archived {} to {}", request.mint(), self.closed.name());
    }

    fn audit(&self, request: &OrderRequest, event: &str, detail: &str, attempts: u32) {
        self.journal.append(
            ORDERS_CHANNEL,
            vec![
                event.to_string(),
                request.kind.to_string(),
                request.id.to_string(),
                request.mint().to_string(),
                request.token.symbol.clone(),
                format!("{:.4}", request.token.market_cap()),
                detail.to_string(),
                attempts.to_string(),
                Utc::now().to_rfc3339(),
            ],
        );
    }
}
