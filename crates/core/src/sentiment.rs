use serde::{Deserialize, Serialize};

/// Risk tier assigned by the sentiment model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SentimentRisk {
    Low,
    #[default]
    Medium,
    High,
}

impl SentimentRisk {
    /// Multiplier applied to the fused signal score.
    #[must_use]
    pub const fn score_multiplier(self) -> f64 {
        match self {
            Self::Low => 1.2,
            Self::Medium => 1.0,
            Self::High => 0.7,
        }
    }

    /// Base leverage for the advisory hint derived from this tier.
    #[must_use]
    pub const fn base_leverage_hint(self) -> u32 {
        match self {
            Self::Low => 10,
            Self::Medium => 5,
            Self::High => 2,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl std::fmt::Display for SentimentRisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SentimentRisk {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(()),
        }
    }
}

/// Sentiment scores on a -100..=100 scale plus qualitative context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentSummary {
    pub overall_sentiment: f64,
    pub short_term_sentiment: f64,
    pub medium_term_sentiment: f64,
    pub risk_level: SentimentRisk,
    pub key_factors: Vec<String>,
    pub reasoning: String,
}

impl SentimentSummary {
    /// Neutral fallback used whenever the sentiment provider cannot deliver
    /// a real answer. Callers never see a sentiment failure.
    #[must_use]
    pub fn neutral(reasoning: impl Into<String>) -> Self {
        Self {
            overall_sentiment: 0.0,
            short_term_sentiment: 0.0,
            medium_term_sentiment: 0.0,
            risk_level: SentimentRisk::Medium,
            key_factors: Vec::new(),
            reasoning: reasoning.into(),
        }
    }
}
