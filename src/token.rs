//! Tracked token model
//!
//! A [`Token`] is created when a create event is decoded and then accumulates
//! curve snapshots and analyses while it moves through the pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;

use crate::analysis::Analysis;
use crate::error::{Error, Result};
use crate::pump::accounts::BondingCurve;
use crate::pump::event::CreateEvent;
use crate::pump::program::associated_bonding_curve;

/// One observation of a token's bonding curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Snapshot {
    pub curve: BondingCurve,
    /// SOL per whole token
    pub price: f64,
    /// Market cap in SOL
    pub market_cap: f64,
    pub observed_at: DateTime<Utc>,
}

impl Snapshot {
    /// Build a snapshot from fetched curve state, deriving price and market cap
    pub fn from_curve(curve: BondingCurve, observed_at: DateTime<Utc>) -> Self {
        let price = curve.price_sol();
        Self {
            curve,
            price,
            market_cap: curve.market_cap_sol(price),
            observed_at,
        }
    }
}

impl std::fmt::Display for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Snapshot{{curve: {}, price: {:.20}, market_cap: {:.2}, time: {}}}",
            self.curve,
            self.price,
            self.market_cap,
            self.observed_at.to_rfc3339()
        )
    }
}

/// A token tracked by the pipeline
#[derive(Debug, Clone)]
pub struct Token {
    mint: Pubkey,
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub bonding_curve: Pubkey,
    pub associated_bonding_curve: Pubkey,
    pub creator: Pubkey,
    /// Set once by the registry on first insert
    pub discovered_at: Option<DateTime<Utc>>,
    history: Vec<Snapshot>,
    analyses: Vec<Analysis>,
    /// Curve completed and migrated off pump.fun
    pub migrated: bool,
    /// Buy issued (or in flight)
    pub trading: bool,
    /// Sell issued (or in flight)
    pub sold: bool,
    revision: u64,
}

impl Token {
    pub fn new(
        mint: Pubkey,
        name: impl Into<String>,
        symbol: impl Into<String>,
        uri: impl Into<String>,
        bonding_curve: Pubkey,
        creator: Pubkey,
    ) -> Self {
        Self {
            mint,
            name: name.into(),
            symbol: symbol.into(),
            uri: uri.into(),
            bonding_curve,
            associated_bonding_curve: associated_bonding_curve(&mint, &bonding_curve),
            creator,
            discovered_at: None,
            history: Vec::new(),
            analyses: Vec::new(),
            migrated: false,
            trading: false,
            sold: false,
            revision: 0,
        }
    }

    /// Build a fresh token from a decoded create event
    pub fn from_create_event(event: &CreateEvent) -> Self {
        Self::new(
            event.mint,
            event.name.clone(),
            event.symbol.clone(),
            event.uri.clone(),
            event.bonding_curve,
            event.user,
        )
    }

    pub fn mint(&self) -> &Pubkey {
        &self.mint
    }

    pub fn history(&self) -> &[Snapshot] {
        &self.history
    }

    pub fn analyses(&self) -> &[Analysis] {
        &self.analyses
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.history.last()
    }

    pub fn latest_analysis(&self) -> Option<&Analysis> {
        self.analyses.last()
    }

    /// Market cap of the latest snapshot, 0 with no history
    pub fn market_cap(&self) -> f64 {
        self.latest().map(|s| s.market_cap).unwrap_or(0.0)
    }

    /// Price of the latest snapshot, 0 with no history
    pub fn price(&self) -> f64 {
        self.latest().map(|s| s.price).unwrap_or(0.0)
    }

    pub fn prices(&self) -> Vec<f64> {
        self.history.iter().map(|s| s.price).collect()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.history.iter().map(|s| s.observed_at).collect()
    }

    /// Append a snapshot. Snapshots older than the latest one are rejected.
    pub fn push_snapshot(&mut self, snapshot: Snapshot) -> Result<()> {
        if let Some(latest) = self.history.last() {
            if snapshot.observed_at < latest.observed_at {
                return Err(Error::OutOfOrder {
                    mint: self.mint.to_string(),
                    observed: snapshot.observed_at,
                    latest: latest.observed_at,
                });
            }
        }

        if snapshot.curve.complete {
            self.migrated = true;
        }
        self.history.push(snapshot);
        Ok(())
    }

    /// Append an analysis. Analyses older than the latest one are rejected.
    pub fn push_analysis(&mut self, analysis: Analysis) -> Result<()> {
        if let Some(latest) = self.analyses.last() {
            if analysis.timestamp < latest.timestamp {
                return Err(Error::OutOfOrder {
                    mint: self.mint.to_string(),
                    observed: analysis.timestamp,
                    latest: latest.timestamp,
                });
            }
        }

        self.analyses.push(analysis);
        Ok(())
    }

    /// Mark sold; a sold token is always trading
    pub fn mark_sold(&mut self) {
        self.trading = true;
        self.sold = true;
    }

    /// Number of registry writes this token has seen
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Move the revision past both its own value and `previous`
    pub(crate) fn advance_revision(&mut self, previous: u64) {
        self.revision = self.revision.max(previous).wrapping_add(1);
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) mint={} curve={} snapshots={} trading={} sold={}",
            self.name,
            self.symbol,
            self.mint,
            self.bonding_curve,
            self.history.len(),
            self.trading,
            self.sold
        )
    }
}
