//! On-chain activity scoring against an Aptos fullnode.
//!
//! The fullnode's ledger endpoint serves as the liveness probe; richer
//! activity and liquidity metrics need an indexer upstream, so until one is
//! wired in the component scores sit at their 0.5 midpoint and the combined
//! signal stays neutral. The provider contract is infallible either way.

use anyhow::Result;
use async_trait::async_trait;
use perp_agent_core::{OnchainConfig, OnchainProvider, OnchainSummary};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

pub struct OnchainClient {
    http: Client,
    rpc_url: String,
}

#[derive(Debug, Clone, Copy)]
struct ActivityMetrics {
    transaction_count_24h: u64,
    activity_score: f64,
}

#[derive(Debug, Clone, Copy)]
struct LiquidityMetrics {
    total_liquidity_usd: f64,
    liquidity_score: f64,
}

impl OnchainClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &OnchainConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            rpc_url: config.rpc_url.clone(),
        })
    }

    async fn ledger_info(&self) -> Result<LedgerInfo> {
        let response = self.http.get(&self.rpc_url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("fullnode returned {}", response.status());
        }
        Ok(response.json().await?)
    }

    /// Transaction-volume metrics. TODO: back with the indexer GraphQL API
    /// so the activity score reflects real 24h transaction counts.
    fn transaction_volume(_symbol: &str) -> ActivityMetrics {
        ActivityMetrics {
            transaction_count_24h: 0,
            activity_score: 0.5,
        }
    }

    /// DEX-pool liquidity metrics. TODO: aggregate pool reserves from the
    /// on-chain DEX registries once an indexer upstream is available.
    fn liquidity_metrics(_symbol: &str) -> LiquidityMetrics {
        LiquidityMetrics {
            total_liquidity_usd: 0.0,
            liquidity_score: 0.5,
        }
    }
}

#[async_trait]
impl OnchainProvider for OnchainClient {
    async fn analyze(&self, symbol: &str) -> OnchainSummary {
        match self.ledger_info().await {
            Ok(info) => {
                debug!(
                    %symbol,
                    chain_id = info.chain_id,
                    ledger_version = %info.ledger_version,
                    "Fullnode reachable"
                );
                let activity = Self::transaction_volume(symbol);
                let liquidity = Self::liquidity_metrics(symbol);
                OnchainSummary::from_scores(
                    activity.activity_score,
                    liquidity.liquidity_score,
                    activity.transaction_count_24h,
                    liquidity.total_liquidity_usd,
                )
            }
            Err(e) => {
                warn!(%symbol, error = %e, "On-chain analysis failed, using neutral fallback");
                OnchainSummary::neutral()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct LedgerInfo {
    #[serde(default)]
    chain_id: u64,
    #[serde(default)]
    ledger_version: String,
}
