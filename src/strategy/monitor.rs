//! Candidate monitor loop
//!
//! Re-polls every candidate's bonding curve on a fixed interval, drops the
//! ones that never reach entry and promotes the ones that do into
//! ActiveTrades.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::rules::{should_evict, should_promote, EntryRules};
use crate::error::Result;
use crate::journal::{AuditSink, MONITOR_CHANNEL};
use crate::pump::{BondingCurve, CurveFetcher};
use crate::registry::TokenRegistry;
use crate::token::{Snapshot, Token};

/// Monitor loop settings
#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    pub interval: Duration,
    /// Curve fetches in flight at once
    pub fetch_concurrency: usize,
    pub rules: EntryRules,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            fetch_concurrency: 8,
            rules: EntryRules::default(),
        }
    }
}

/// What one tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorReport {
    pub observed: usize,
    pub fetch_failures: usize,
    pub evicted: usize,
    pub promoted: usize,
}

pub struct Monitor {
    candidates: Arc<TokenRegistry>,
    active: Arc<TokenRegistry>,
    fetcher: Arc<dyn CurveFetcher>,
    journal: Arc<dyn AuditSink>,
    settings: MonitorSettings,
}

impl Monitor {
    pub fn new(
        candidates: Arc<TokenRegistry>,
        active: Arc<TokenRegistry>,
        fetcher: Arc<dyn CurveFetcher>,
        journal: Arc<dyn AuditSink>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            candidates,
            active,
            fetcher,
            journal,
            settings,
        }
    }

    /// Tick every interval until cancelled; the first tick fires after one period
    pub async fn run(&self, cancel: CancellationToken) {
        let period = self.settings.interval;
        info!("Monitor loop started ({}s interval)", period.as_secs());

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.tick().await;
                    debug!(
                        "Monitor tick: {} observed, {} fetch failures, {} evicted, {} promoted",
                        report.observed, report.fetch_failures, report.evicted, report.promoted
                    );
                }
            }
        }

        self.journal.flush(MONITOR_CHANNEL);
        info!("Monitor loop stopped");
    }

    /// One pass over all candidates
    pub async fn tick(&self) -> MonitorReport {
        let candidates = self.candidates.snapshot();
        let mut report = MonitorReport::default();

        let fetched: Vec<(Pubkey, Result<BondingCurve>)> = stream::iter(candidates.into_values())
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
            self.audit("MONITOR", &token);

            if should_evict(&token, &self.settings.rules) {
                info!(
                    "REMOVE {} ({}) after {} snapshots at {:.2} SOL",
                    token.symbol,
                    mint,
                    token.history_len(),
                    token.market_cap()
                );
                self.audit("REMOVE", &token);
                self.candidates.delete(&mint);
                report.evicted += 1;
                continue;
            }

            if should_promote(&token, &self.settings.rules) {
                info!(
                    "ADD TO TRADES {} ({}) at {:.2} SOL",
                    token.symbol,
                    mint,
                    token.market_cap()
                );
                self.active.set(token.clone());
                if let Some(promoted) = self.candidates.update(&mint, |candidate| {
                    candidate.trading = true;
                    candidate.clone()
                }) {
                    self.audit("ADD", &promoted);
                }
                report.promoted += 1;
            }
        }

        self.journal.flush(MONITOR_CHANNEL);
        report
    }

    /// Append a snapshot to the candidate; the updated copy, or `None` if it
    /// vanished or the snapshot was rejected
    fn observe(&self, mint: &Pubkey, curve: BondingCurve) -> Option<Token> {
        let snapshot = Snapshot::from_curve(curve, Utc::now());
        match self
            .candidates
            .update(mint, |token| token.push_snapshot(snapshot).map(|_| token.clone()))
        {
            Some(Ok(token)) => Some(token),
            Some(Err(e)) => {
                warn!("Dropped snapshot for {}: {}", mint, e);
                None
            }
            None => {
                debug!("{} left candidates during fetch", mint);
                None
            }
        }
    }

    fn audit(&self, tag: &str, token: &Token) {
        self.journal.append(
            MONITOR_CHANNEL,
            vec![
                tag.to_string(),
                token.mint().to_string(),
                token.name.clone(),
                token.symbol.clone(),
                token
                    .discovered_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default(),
                token.history_len().to_string(),
                token.latest().map(|s| s.to_string()).unwrap_or_default(),
                token.trading.to_string(),
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
    use chrono::Duration as ChronoDuration;
    use std::sync::atomic::Ordering;

    struct Harness {
        candidates: Arc<TokenRegistry>,
        active: Arc<TokenRegistry>,
        fetcher: Arc<StaticFetcher>,
        journal: Arc<MemoryJournal>,
        monitor: Monitor,
    }

    fn harness() -> Harness {
        let candidates = Arc::new(TokenRegistry::new("candidates"));
        let active = Arc::new(TokenRegistry::new("active"));
        let fetcher = Arc::new(StaticFetcher::default());
        let journal = Arc::new(MemoryJournal::new());
        let monitor = Monitor::new(
            candidates.clone(),
            active.clone(),
            fetcher.clone(),
            journal.clone(),
            MonitorSettings::default(),
        );
        Harness {
            candidates,
            active,
            fetcher,
            journal,
            monitor,
        }
    }

    /// Candidate with `history` past snapshots at `market_cap`
    fn candidate(history: usize, market_cap: f64) -> Token {
        let mut token = test_token();
        let start = Utc::now() - ChronoDuration::minutes(60);
        for i in 0..history {
            let at = start + ChronoDuration::seconds(i as i64 * 30);
            token
                .push_snapshot(Snapshot::from_curve(curve_with_market_cap(market_cap), at))
                .unwrap();
        }
        token
    }

    fn tags(journal: &MemoryJournal) -> Vec<String> {
        journal
            .records(MONITOR_CHANNEL)
            .into_iter()
            .map(|record| record[0].clone())
            .collect()
    }

    #[tokio::test]
    async fn test_candidate_promoted_to_active() {
        let h = harness();
        let token = candidate(2, 40.0);
        h.fetcher.insert(token.bonding_curve, curve_with_market_cap(40.0));
        h.candidates.set(token.clone());

        let report = h.monitor.tick().await;
        assert_eq!(report.promoted, 1);
        assert_eq!(report.evicted, 0);

        let promoted = h.active.get(token.mint()).unwrap();
        assert_eq!(promoted.history_len(), 3);
        assert!(!promoted.trading, "active copy must still issue the buy");
        assert!(h.candidates.get(token.mint()).unwrap().trading);

        assert_eq!(tags(&h.journal), vec!["MONITOR", "ADD"]);
        assert_eq!(h.journal.flush_count(MONITOR_CHANNEL), 1);

        // Already trading: not promoted twice
        let report = h.monitor.tick().await;
        assert_eq!(report.promoted, 0);
    }

    #[tokio::test]
    async fn test_stale_candidate_evicted() {
        let h = harness();
        let token = candidate(20, 10.0);
        h.fetcher.insert(token.bonding_curve, curve_with_market_cap(10.0));
        h.candidates.set(token.clone());

        let report = h.monitor.tick().await;
        assert_eq!(report.evicted, 1);
        assert_eq!(report.promoted, 0);
        assert!(!h.candidates.contains(token.mint()));
        assert!(!h.active.contains(token.mint()));
        assert_eq!(tags(&h.journal), vec!["MONITOR", "REMOVE"]);
    }

    #[tokio::test]
    async fn test_young_candidate_kept() {
        let h = harness();
        let token = candidate(1, 40.0);
        h.fetcher.insert(token.bonding_curve, curve_with_market_cap(40.0));
        h.candidates.set(token.clone());

        let report = h.monitor.tick().await;
        assert_eq!(report, MonitorReport { observed: 1, ..Default::default() });
        assert_eq!(h.candidates.get(token.mint()).unwrap().history_len(), 2);
        assert_eq!(h.active.count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_token() {
        let h = harness();
        let token = candidate(2, 40.0);
        h.candidates.set(token.clone());

        let report = h.monitor.tick().await;
        assert_eq!(report.fetch_failures, 1);
        assert_eq!(report.observed, 0);
        assert_eq!(h.candidates.get(token.mint()).unwrap().history_len(), 2);
        assert!(h.journal.records(MONITOR_CHANNEL).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_on_interval_until_cancelled() {
        let h = harness();
        let token = candidate(0, 20.0);
        h.fetcher.insert(token.bonding_curve, curve_with_market_cap(20.0));
        h.candidates.set(token);

        let cancel = CancellationToken::new();
        let monitor = Arc::new(h.monitor);
        let task = {
            let monitor = monitor.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { monitor.run(cancel).await })
        };

        // Nothing before the first period elapses
        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 1);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 1);
    }
}
