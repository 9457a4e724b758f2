use serde::{Deserialize, Serialize};

/// On-chain activity summary. `onchain_signal` is on a -100..=100 scale,
/// the component scores on 0..=1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnchainSummary {
    pub onchain_signal: f64,
    pub activity_score: f64,
    pub liquidity_score: f64,
    pub transaction_count_24h: u64,
    pub total_liquidity_usd: f64,
}

impl OnchainSummary {
    /// Combine component scores into a summary. The signal maps the mean of
    /// the two 0..=1 scores onto -100..=100, centered at 0.5.
    #[must_use]
    pub fn from_scores(
        activity_score: f64,
        liquidity_score: f64,
        transaction_count_24h: u64,
        total_liquidity_usd: f64,
    ) -> Self {
        let onchain_signal = ((activity_score + liquidity_score) / 2.0 - 0.5) * 200.0;
        Self {
            onchain_signal,
            activity_score,
            liquidity_score,
            transaction_count_24h,
            total_liquidity_usd,
        }
    }

    /// Neutral fallback: mid scores, zero signal. The on-chain provider
    /// never surfaces an error past its boundary.
    #[must_use]
    pub fn neutral() -> Self {
        Self::from_scores(0.5, 0.5, 0, 0.0)
    }
}
