use crate::error::AgentError;
use crate::market::{OhlcBar, TokenQuote};
use crate::onchain::OnchainSummary;
use crate::sentiment::SentimentSummary;
use async_trait::async_trait;

/// Source of authoritative quotes and historical candles.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Latest quote for `symbol`, or `TokenNotFound` when the upstream has
    /// no listing for it.
    async fn quote(&self, symbol: &str) -> Result<TokenQuote, AgentError>;

    /// Daily/hourly OHLC series covering the last `days` days.
    async fn historical(&self, symbol: &str, days: u32) -> Result<Vec<OhlcBar>, AgentError>;
}

/// Sentiment scoring. Infallible by contract: implementations map every
/// internal failure to `SentimentSummary::neutral`.
#[async_trait]
pub trait SentimentProvider: Send + Sync {
    async fn analyze(
        &self,
        symbol: &str,
        name: &str,
        quote: &TokenQuote,
        model: &str,
    ) -> SentimentSummary;
}

/// On-chain activity scoring. Infallible by contract: implementations map
/// every internal failure to `OnchainSummary::neutral`.
#[async_trait]
pub trait OnchainProvider: Send + Sync {
    async fn analyze(&self, symbol: &str) -> OnchainSummary;
}
