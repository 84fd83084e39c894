//! Active trade loop
//!
//! Re-polls every token in ActiveTrades, records a fresh analysis and
//! queues entry or exit orders. Orders are fire-and-forget: the loop never
//! waits for an execution result.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::rules::{trade_signal, ExitRules};
use crate::analysis::{analyze, AnalysisParams};
use crate::error::Result;
use crate::journal::{AuditSink, TRADE_CHANNEL};
use crate::pump::{BondingCurve, CurveFetcher};
use crate::registry::TokenRegistry;
use crate::token::{Snapshot, Token};
use crate::trading::{OrderKind, OrderRequest, OrderSubmitter};

/// Trade loop settings
#[derive(Debug, Clone, Copy)]
pub struct TraderSettings {
    pub interval: Duration,
    pub fetch_concurrency: usize,
    pub exit: ExitRules,
    pub analysis: AnalysisParams,
}

impl Default for TraderSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            fetch_concurrency: 8,
            exit: ExitRules::default(),
            analysis: AnalysisParams::default(),
        }
    }
}

/// What one tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraderReport {
    pub observed: usize,
    pub fetch_failures: usize,
    pub buys: usize,
    pub sells: usize,
}

pub struct Trader {
    active: Arc<TokenRegistry>,
    fetcher: Arc<dyn CurveFetcher>,
    orders: OrderSubmitter,
    journal: Arc<dyn AuditSink>,
    settings: TraderSettings,
}

impl Trader {
    pub fn new(
        active: Arc<TokenRegistry>,
        fetcher: Arc<dyn CurveFetcher>,
        orders: OrderSubmitter,
        journal: Arc<dyn AuditSink>,
        settings: TraderSettings,
    ) -> Self {
        Self {
            active,
            fetcher,
            orders,
            journal,
            settings,
        }
    }

    /// Tick every interval until cancelled
    ///
    /// A tick blocked on a full order queue is abandoned on cancellation.
    pub async fn run(&self, cancel: CancellationToken) {
        let period = self.settings.interval;
        info!("Trade loop started ({}s interval)", period.as_secs());

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        report = self.tick() => debug!(
                            "Trade tick: {} observed, {} fetch failures, {} buys, {} sells",
                            report.observed, report.fetch_failures, report.buys, report.sells
                        ),
                    }
                }
            }
        }

        self.journal.flush(TRADE_CHANNEL);
        info!("Trade loop stopped");
    }

    /// One pass over ActiveTrades
    pub async fn tick(&self) -> TraderReport {
        let active = self.active.snapshot();
        let mut report = TraderReport::default();

        let fetched: Vec<(Pubkey, Result<BondingCurve>)> = stream::iter(active.into_values())
            .map(|token| async move {
                let result = self.fetcher.fetch(&token.bonding_curve).await;
                (*token.mint(), result)
            })
            .buffer_unordered(self.settings.fetch_concurrency.max(1))
            .collect()
            .await;

        for (mint, result) in fetched {
            let curve = match result {
                Ok(curve) => curve,
                Err(e) => {
                    warn!("Failed to fetch bonding curve for {}: {}", mint, e);
                    report.fetch_failures += 1;
                    continue;
                }
            };

            let Some(token) = self.observe(&mint, curve) else {
                continue;
            };
            report.observed += 1;
            self.audit_observation(&token);

            let Some(kind) = trade_signal(&token, &self.settings.exit) else {
                continue;
            };
            let request = match kind {
                OrderKind::Buy => OrderRequest::buy(token),
                OrderKind::Sell => OrderRequest::sell(token),
            };
            self.audit_order(&request);

            info!("{} {} ({}): {}", kind, request.token.symbol, mint, request.reason);
            if let Err(e) = self.orders.submit(request).await {
                warn!("Could not queue {} for {}: {}", kind, mint, e);
                continue;
            }
            match kind {
                OrderKind::Buy => report.buys += 1,
                OrderKind::Sell => report.sells += 1,
            }
        }

        self.journal.flush(TRADE_CHANNEL);
        report
    }

    /// Append a snapshot and its analysis in one registry write
    fn observe(&self, mint: &Pubkey, curve: BondingCurve) -> Option<Token> {
        let snapshot = Snapshot::from_curve(curve, Utc::now());
        let params = self.settings.analysis;
        let updated = self.active.update(mint, |token| -> Result<Token> {
            token.push_snapshot(snapshot)?;
            let analysis = analyze(token, &params);
            token.push_analysis(analysis)?;
            Ok(token.clone())
        });

        match updated {
            Some(Ok(token)) => Some(token),
            Some(Err(e)) => {
                warn!("Dropped observation for {}: {}", mint, e);
                None
            }
            None => {
                debug!("{} left active trades during fetch", mint);
                None
            }
        }
    }

    fn audit_observation(&self, token: &Token) {
        self.journal.append(
            TRADE_CHANNEL,
            vec![
                "TRADE".to_string(),
                token.mint().to_string(),
                token.name.clone(),
                token.symbol.clone(),
                format!("{:.4}", token.market_cap()),
                format!("{:.12}", token.price()),
                token
                    .latest_analysis()
                    .map(|a| a.to_string())
                    .unwrap_or_default(),
                token.trading.to_string(),
                token.sold.to_string(),
            ],
        );
    }

    fn audit_order(&self, request: &OrderRequest) {
        let token = &request.token;
        self.journal.append(
            TRADE_CHANNEL,
            vec![
                request.kind.to_string(),
                token.mint().to_string(),
                token.name.clone(),
                token.symbol.clone(),
                format!("{:.4}", token.market_cap()),
                format!("{:.12}", token.price()),
                request.reason.clone(),
            ],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::MemoryJournal;
    use crate::pump::fetcher::tests::StaticFetcher;
    use crate::token::tests::{curve_with_market_cap, test_token};
    use crate::trading::dispatcher::tests::test_queue;
    use crate::trading::order::{ENTRY_REASON, EXIT_REASON};

    struct Harness {
        active: Arc<TokenRegistry>,
        fetcher: Arc<StaticFetcher>,
        journal: Arc<MemoryJournal>,
        queue: async_channel::Receiver<OrderRequest>,
        trader: Trader,
    }

    fn harness() -> Harness {
        let active = Arc::new(TokenRegistry::new("active"));
        let fetcher = Arc::new(StaticFetcher::default());
        let journal = Arc::new(MemoryJournal::new());
        let (orders, queue) = test_queue(16);
        let trader = Trader::new(
            active.clone(),
            fetcher.clone(),
            orders,
            journal.clone(),
            TraderSettings::default(),
        );
        Harness {
            active,
            fetcher,
            journal,
            queue,
            trader,
        }
    }

    fn held_token(h: &Harness, market_cap: f64) -> Token {
        let mut token = test_token();
        token.trading = true;
        h.fetcher.insert(token.bonding_curve, curve_with_market_cap(market_cap));
        h.active.set(token.clone());
        token
    }

    #[tokio::test]
    async fn test_exit_above_threshold_queues_one_sell() {
        let h = harness();
        let token = held_token(&h, 50.0);

        let report = h.trader.tick().await;
        assert_eq!(report.sells, 1);
        assert_eq!(report.buys, 0);

        let request = h.queue.try_recv().unwrap();
        assert_eq!(request.kind, OrderKind::Sell);
        assert_eq!(request.reason, EXIT_REASON);
        assert_eq!(request.mint(), token.mint());
        assert!(h.queue.try_recv().is_err());

        let stored = h.active.get(token.mint()).unwrap();
        assert_eq!(stored.history_len(), 1);
        assert_eq!(stored.analyses().len(), 1);
    }

    #[tokio::test]
    async fn test_held_token_below_exit_waits() {
        let h = harness();
        held_token(&h, 40.0);

        let report = h.trader.tick().await;
        assert_eq!(report, TraderReport { observed: 1, ..Default::default() });
        assert!(h.queue.is_empty());
    }

    #[tokio::test]
    async fn test_new_active_token_queues_buy() {
        let h = harness();
        let token = test_token();
        h.fetcher.insert(token.bonding_curve, curve_with_market_cap(36.0));
        h.active.set(token.clone());

        let report = h.trader.tick().await;
        assert_eq!(report.buys, 1);

        let request = h.queue.try_recv().unwrap();
        assert_eq!(request.kind, OrderKind::Buy);
        assert_eq!(request.reason, ENTRY_REASON);

        let tags: Vec<String> = h
            .journal
            .records(TRADE_CHANNEL)
            .into_iter()
            .map(|r| r[0].clone())
            .collect();
        assert_eq!(tags, vec!["TRADE", "BUY"]);
        assert_eq!(h.journal.flush_count(TRADE_CHANNEL), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_token() {
        let h = harness();
        let token = test_token();
        h.active.set(token.clone());

        let report = h.trader.tick().await;
        assert_eq!(report.fetch_failures, 1);
        assert!(h.queue.is_empty());
        assert_eq!(h.active.get(token.mint()).unwrap().history_len(), 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel_with_full_queue() {
        let active = Arc::new(TokenRegistry::new("active"));
        let fetcher = Arc::new(StaticFetcher::default());
        let (orders, _queue) = test_queue(1);
        orders.try_submit(OrderRequest::buy(test_token())).unwrap();

        let token = test_token();
        fetcher.insert(token.bonding_curve, curve_with_market_cap(36.0));
        active.set(token);

        let trader = Trader::new(
            active,
            fetcher,
            orders,
            Arc::new(MemoryJournal::new()),
            TraderSettings {
                interval: Duration::from_millis(10),
                ..TraderSettings::default()
            },
        );

        let cancel = CancellationToken::new();
        let task = {
            let cancel = cancel.clone();
            tokio::spawn(async move { trader.run(cancel).await })
        };

        // Let the first tick block on the full queue
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
