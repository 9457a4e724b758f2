use crate::market::TokenQuote;
use crate::onchain::OnchainSummary;
use crate::sentiment::{SentimentRisk, SentimentSummary};
use serde::{Deserialize, Serialize};

/// Score above which a LONG is recommended (SHORT below its negation).
pub const LONG_THRESHOLD: f64 = 15.0;

const SENTIMENT_WEIGHT: f64 = 0.35;
const MOMENTUM_WEIGHT: f64 = 0.30;
const ONCHAIN_WEIGHT: f64 = 0.20;
const MOMENTUM_GAIN: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Long,
    Short,
    Hold,
}

impl Recommendation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Long => "LONG",
            Self::Short => "SHORT",
            Self::Hold => "HOLD",
        }
    }

    /// The side that would close a position of the opposite side.
    #[must_use]
    pub const fn is_directional(self) -> bool {
        matches!(self, Self::Long | Self::Short)
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-source contributions behind a decision, kept for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalBreakdown {
    pub sentiment_score: f64,
    pub market_momentum: f64,
    pub onchain_signal: f64,
    pub risk_level: SentimentRisk,
}

/// Advisory leverage derived from the sentiment risk tier.
///
/// This hint is informational only: position sizing uses the session risk
/// level (see `sizing::leverage_for`), not the sentiment tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeverageHint {
    pub suggested_leverage: u32,
    pub max_safe_leverage: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub recommendation: Recommendation,
    /// Confidence as a percentage (0..=100), rounded to two decimals.
    pub confidence: f64,
    /// Fused signal score, rounded to two decimals.
    pub final_score: f64,
    pub breakdown: SignalBreakdown,
    pub leverage_hint: LeverageHint,
    pub reasoning: String,
}

/// Fuses market momentum, sentiment, and on-chain signals into a single
/// LONG/SHORT/HOLD recommendation with a confidence score.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalFusion;

impl SignalFusion {
    #[must_use]
    pub fn evaluate(
        quote: &TokenQuote,
        sentiment: &SentimentSummary,
        onchain: &OnchainSummary,
    ) -> Decision {
        let momentum = (quote.percent_change_24h * 0.6 + quote.percent_change_1h * 0.4)
            * MOMENTUM_GAIN;

        let sentiment_component = (sentiment.overall_sentiment * 0.6
            + sentiment.short_term_sentiment * 0.4)
            * SENTIMENT_WEIGHT;
        let momentum_component = momentum * MOMENTUM_WEIGHT;
        let onchain_component = onchain.onchain_signal * ONCHAIN_WEIGHT;

        let final_score = (sentiment_component + momentum_component + onchain_component)
            * sentiment.risk_level.score_multiplier();

        let (recommendation, confidence) = if final_score > LONG_THRESHOLD {
            (Recommendation::Long, (final_score.abs() / 50.0).min(1.0))
        } else if final_score < -LONG_THRESHOLD {
            (Recommendation::Short, (final_score.abs() / 50.0).min(1.0))
        } else {
            // Near the threshold this can dip below zero; clamp.
            let c = 1.0 - final_score.abs() / LONG_THRESHOLD;
            (Recommendation::Hold, c.max(0.0))
        };

        let leverage_hint = Self::leverage_hint(confidence, sentiment.risk_level);

        Decision {
            recommendation,
            confidence: round2(confidence * 100.0),
            final_score: round2(final_score),
            breakdown: SignalBreakdown {
                sentiment_score: round2(sentiment.overall_sentiment),
                market_momentum: round2(momentum),
                onchain_signal: round2(onchain.onchain_signal),
                risk_level: sentiment.risk_level,
            },
            leverage_hint,
            reasoning: Self::reasoning(final_score, quote, sentiment),
        }
    }

    /// Advisory leverage from the sentiment risk tier, scaled by confidence
    /// (a fraction here, not a percentage).
    fn leverage_hint(confidence: f64, risk: SentimentRisk) -> LeverageHint {
        let base = risk.base_leverage_hint();
        let suggested = if confidence > 0.8 {
            (base * 2).min(20)
        } else if confidence > 0.6 {
            base
        } else {
            (base / 2).max(1)
        };
        LeverageHint {
            suggested_leverage: suggested,
            max_safe_leverage: base * 2,
        }
    }

    fn reasoning(score: f64, quote: &TokenQuote, sentiment: &SentimentSummary) -> String {
        let mut parts = vec![
            format!("Overall signal score: {score:.2}"),
            format!("24h price change: {:.2}%", quote.percent_change_24h),
        ];
        if !sentiment.key_factors.is_empty() {
            let top: Vec<&str> = sentiment
                .key_factors
                .iter()
                .take(3)
                .map(String::as_str)
                .collect();
            parts.push(format!("Key factors: {}", top.join(", ")));
        }
        parts.push(format!("Risk level: {}", sentiment.risk_level));
        parts.join(" | ")
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub(crate) fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
