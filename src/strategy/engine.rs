//! Trading engine
//!
//! Owns the token registries and wires the pipeline together:
//!
//! ```text
//! listener -> intake -> Candidates -> monitor -> ActiveTrades -> trader
//!                                                    |              |
//!                                                 Closed  <-  dispatcher
//! ```
//!
//! Every task observes the same cancellation token; `shutdown` cancels it and
//! waits for all of them.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::monitor::Monitor;
use super::trader::Trader;
use crate::config::Config;
use crate::error::Result;
use crate::journal::AuditSink;
use crate::pump::{CurveFetcher, PUMP_PROGRAM_ID};
use crate::registry::TokenRegistry;
use crate::stream::{
    run_listener, BackpressureChannel, ListenerStats, LogSource, WsLogSource, WsLogSourceConfig,
};
use crate::token::{Snapshot, Token};
use crate::trading::{DispatcherStats, OrderDispatcher, OrderExecutor};

/// Registry and stream counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub candidates: usize,
    pub active: usize,
    pub closed: usize,
    /// Tokens dropped by the listener's output channel
    pub dropped_events: u64,
}

/// Final report returned by [`Engine::shutdown`]
#[derive(Debug, Clone)]
pub struct ShutdownReport {
    pub stats: EngineStats,
    pub listener: Option<ListenerStats>,
    pub orders: Option<DispatcherStats>,
}

#[derive(Default)]
struct Tasks {
    listener: Option<JoinHandle<ListenerStats>>,
    dispatcher: Option<JoinHandle<DispatcherStats>>,
    loops: Vec<(&'static str, JoinHandle<()>)>,
}

pub struct Engine {
    config: Config,
    candidates: Arc<TokenRegistry>,
    active: Arc<TokenRegistry>,
    closed: Arc<TokenRegistry>,
    fetcher: Arc<dyn CurveFetcher>,
    executor: Arc<dyn OrderExecutor>,
    journal: Arc<dyn AuditSink>,
    events: Arc<BackpressureChannel<Token>>,
    cancel: CancellationToken,
    tasks: Tasks,
}

impl Engine {
    pub fn new(
        config: Config,
        fetcher: Arc<dyn CurveFetcher>,
        executor: Arc<dyn OrderExecutor>,
        journal: Arc<dyn AuditSink>,
    ) -> Self {
        let events = Arc::new(BackpressureChannel::new(
            config.listener.channel_capacity,
            config.listener.drop_policy,
        ));

        Self {
            config,
            candidates: Arc::new(TokenRegistry::new("candidates")),
            active: Arc::new(TokenRegistry::new("active")),
            closed: Arc::new(TokenRegistry::new("closed")),
            fetcher,
            executor,
            journal,
            events,
            cancel: CancellationToken::new(),
            tasks: Tasks::default(),
        }
    }

    /// Connect to the RPC log stream and start the pipeline
    ///
    /// Fails if the stream cannot be reached within the configured attempts.
    pub async fn start_live(&mut self) -> Result<()> {
        let ws_config = WsLogSourceConfig {
            ws_url: self.config.rpc.ws_endpoint.clone(),
            program: *PUMP_PROGRAM_ID,
            commitment: self.config.listener.commitment.clone(),
            ping_interval_secs: self.config.listener.ping_interval_secs,
        };

        info!("Connecting to log stream...");
        let source = WsLogSource::connect_with_retry(
            &ws_config,
            self.config.listener.connect_attempts,
            Duration::from_millis(self.config.listener.reconnect_delay_ms),
        )
        .await?;

        self.start(source);
        Ok(())
    }

    /// Start every task, reading create events from `source`
    pub fn start<S: LogSource + 'static>(&mut self, source: S) {
        if self.tasks.listener.is_some() {
            debug!("Engine already started");
            return;
        }

        self.tasks.listener = Some(tokio::spawn(run_listener(
            source,
            self.events.clone(),
            self.cancel.clone(),
        )));

        self.tasks.loops.push((
            "intake",
            tokio::spawn(intake(
                self.events.clone(),
                [
                    self.candidates.clone(),
                    self.active.clone(),
                    self.closed.clone(),
                ],
                self.fetcher.clone(),
            )),
        ));

        let dispatcher = OrderDispatcher::new(
            self.config.dispatcher_config(),
            self.executor.clone(),
            self.active.clone(),
            self.closed.clone(),
            self.journal.clone(),
        );
        let submitter = dispatcher.submitter();
        self.tasks.dispatcher = Some(tokio::spawn(dispatcher.run(self.cancel.clone())));

        let monitor = Monitor::new(
            self.candidates.clone(),
            self.active.clone(),
            self.fetcher.clone(),
            self.journal.clone(),
            self.config.monitor_settings(),
        );
        let cancel = self.cancel.clone();
        self.tasks
            .loops
            .push(("monitor", tokio::spawn(async move { monitor.run(cancel).await })));

        let trader = Trader::new(
            self.active.clone(),
            self.fetcher.clone(),
            submitter,
            self.journal.clone(),
            self.config.trader_settings(),
        );
        let cancel = self.cancel.clone();
        self.tasks
            .loops
            .push(("trader", tokio::spawn(async move { trader.run(cancel).await })));

        info!("Engine started");
    }

    /// Token that stops every task when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn candidates(&self) -> &Arc<TokenRegistry> {
        &self.candidates
    }

    pub fn active(&self) -> &Arc<TokenRegistry> {
        &self.active
    }

    pub fn closed(&self) -> &Arc<TokenRegistry> {
        &self.closed
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            candidates: self.candidates.count(),
            active: self.active.count(),
            closed: self.closed.count(),
            dropped_events: self.events.dropped_count(),
        }
    }

    /// Cancel every task, wait for them and close the journal
    pub async fn shutdown(mut self) -> ShutdownReport {
        info!("Shutting down engine...");
        self.cancel.cancel();

        let listener = match self.tasks.listener.take() {
            Some(handle) => match handle.await {
                Ok(stats) => {
                    info!(
                        "Listener stopped ({:?}): {} batches, {} tokens",
                        stats.exit, stats.batches, stats.tokens
                    );
                    Some(stats)
                }
                Err(e) => {
                    error!("Listener task failed: {}", e);
                    None
                }
            },
            None => None,
        };

        for (name, handle) in self.tasks.loops.drain(..) {
            if let Err(e) = handle.await {
                error!("{} task failed: {}", name, e);
            }
        }

        let orders = match self.tasks.dispatcher.take() {
            Some(handle) => handle
                .await
                .map_err(|e| error!("Dispatcher task failed: {}", e))
                .ok(),
            None => None,
        };

        self.journal.close_all();

        let stats = self.stats();
        info!(
            "Engine stopped: {} candidates, {} active, {} closed, {} dropped events",
            stats.candidates, stats.active, stats.closed, stats.dropped_events
        );

        ShutdownReport {
            stats,
            listener,
            orders,
        }
    }
}

/// Move discovered tokens into Candidates, with a first snapshot when the
/// curve is already readable
///
/// `registries` is `[candidates, active, closed]`. A mint already held by any
/// of them (a replayed create log) is ignored so its history survives.
async fn intake(
    events: Arc<BackpressureChannel<Token>>,
    registries: [Arc<TokenRegistry>; 3],
    fetcher: Arc<dyn CurveFetcher>,
) {
    let candidates = &registries[0];
    while let Some(mut token) = events.recv().await {
        if let Some(known) = registries.iter().find(|r| r.contains(token.mint())) {
            debug!("Ignoring repeated create for {} (already in {})", token.mint(), known.name());
            continue;
        }

        match fetcher.fetch(&token.bonding_curve).await {
            Ok(curve) => {
                if let Err(e) = token.push_snapshot(Snapshot::from_curve(curve, Utc::now())) {
                    debug!("Initial snapshot for {} rejected: {}", token.mint(), e);
                }
            }
            Err(e) => debug!("Initial curve fetch for {} failed: {}", token.mint(), e),
        }

        info!(
            "New token {} ({}) mint={} mcap={:.2} SOL",
            token.name,
            token.symbol,
            token.mint(),
            token.market_cap()
        );
        candidates.set(token);
    }

    debug!("Intake stopped: listener output closed");
}
