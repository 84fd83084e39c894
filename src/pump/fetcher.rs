//! Bonding curve state fetcher
//!
//! Reads bonding curve accounts over RPC. The loops only see the
//! [`CurveFetcher`] trait so tests can substitute an in-memory source.

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::accounts::BondingCurve;
use crate::config::RpcConfig;
use crate::error::{Error, Result};

/// Source of bonding curve state
#[async_trait]
pub trait CurveFetcher: Send + Sync {
    /// Fetch and decode the bonding curve account at `bonding_curve`
    async fn fetch(&self, bonding_curve: &Pubkey) -> Result<BondingCurve>;
}

/// Fetches bonding curves from a Solana RPC node
pub struct RpcCurveFetcher {
    rpc_client: Arc<RpcClient>,
    timeout_ms: u64,
}

impl RpcCurveFetcher {
    pub fn new(config: &RpcConfig) -> Result<Self> {
        let commitment = CommitmentConfig::from_str(&config.commitment)
            .map_err(|_| Error::Config(format!("Invalid commitment: {}", config.commitment)))?;

        let rpc_client = RpcClient::new_with_timeout_and_commitment(
            config.endpoint.clone(),
            Duration::from_millis(config.timeout_ms),
            commitment,
        );

        Ok(Self {
            rpc_client: Arc::new(rpc_client),
            timeout_ms: config.timeout_ms,
        })
    }

    /// Underlying RPC client
    pub fn rpc_client(&self) -> Arc<RpcClient> {
        self.rpc_client.clone()
    }
}

#[async_trait]
impl CurveFetcher for RpcCurveFetcher {
    async fn fetch(&self, bonding_curve: &Pubkey) -> Result<BondingCurve> {
        // The client timeout covers the HTTP call; this bounds the whole fetch
        let data = tokio::time::timeout(
            Duration::from_millis(self.timeout_ms),
            self.rpc_client.get_account_data(bonding_curve),
        )
        .await
        .map_err(|_| Error::RpcTimeout(self.timeout_ms))?
        .map_err(|e| Error::Rpc(format!("Failed to fetch bonding curve {}: {}", bonding_curve, e)))?;

        debug!("Fetched {} bytes for bonding curve {}", data.len(), bonding_curve);
        BondingCurve::try_from_account_data(&data)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use dashmap::DashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory fetcher; unknown curves fail with a retryable RPC error
    #[derive(Default)]
    pub(crate) struct StaticFetcher {
        curves: DashMap<Pubkey, BondingCurve>,
        pub calls: AtomicUsize,
    }

    impl StaticFetcher {
        pub fn insert(&self, bonding_curve: Pubkey, curve: BondingCurve) {
            self.curves.insert(bonding_curve, curve);
        }
    }

    #[async_trait]
    impl CurveFetcher for StaticFetcher {
        async fn fetch(&self, bonding_curve: &Pubkey) -> Result<BondingCurve> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.curves
                .get(bonding_curve)
                .map(|c| *c)
                .ok_or_else(|| Error::Rpc(format!("account {} not found", bonding_curve)))
        }
    }

    #[tokio::test]
    async fn test_static_fetcher() {
        let fetcher = StaticFetcher::default();
        let curve_address = Pubkey::new_unique();
        let curve = BondingCurve {
            virtual_sol_reserves: 30_000_000_000,
            virtual_token_reserves: 1_000_000_000_000_000,
            ..Default::default()
        };
        fetcher.insert(curve_address, curve);

        assert_eq!(fetcher.fetch(&curve_address).await.unwrap(), curve);
        assert!(fetcher.fetch(&Pubkey::new_unique()).await.is_err());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_invalid_commitment_rejected() {
        let config = RpcConfig {
            commitment: "eventually".to_string(),
            ..RpcConfig::default()
        };
        assert!(matches!(RpcCurveFetcher::new(&config), Err(Error::Config(_))));
    }
}
