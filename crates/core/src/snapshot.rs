use crate::decision::{Recommendation, SignalBreakdown};
use crate::onchain::OnchainSummary;
use crate::position::Position;
use crate::sentiment::SentimentSummary;
use crate::sizing::{LeverageSuggestion, RiskLevel, TradeDetails};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Market figures carried in a snapshot. `price` mirrors `live_price` for
/// display continuity; `reference_price` is the authoritative quote the
/// walk is bounded around.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub price: f64,
    pub live_price: f64,
    pub reference_price: f64,
    pub market_cap: f64,
    pub volume_24h: f64,
    pub percent_change_1h: f64,
    pub percent_change_24h: f64,
    pub percent_change_7d: f64,
}

impl MarketSnapshot {
    #[must_use]
    pub fn zeroed() -> Self {
        Self {
            price: 0.0,
            live_price: 0.0,
            reference_price: 0.0,
            market_cap: 0.0,
            volume_24h: 0.0,
            percent_change_1h: 0.0,
            percent_change_24h: 0.0,
            percent_change_7d: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionState {
    None,
    Open,
    Closed,
}

/// Position block of a snapshot: lifecycle state plus the position value
/// when one exists (open or just closed this tick).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSummary {
    pub status: PositionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl PositionSummary {
    #[must_use]
    pub const fn none() -> Self {
        Self {
            status: PositionState::None,
            position: None,
        }
    }

    #[must_use]
    pub fn from_position(position: Option<&Position>) -> Self {
        match position {
            None => Self::none(),
            Some(p) if p.is_open() => Self {
                status: PositionState::Open,
                position: Some(p.clone()),
            },
            Some(p) => Self {
                status: PositionState::Closed,
                position: Some(p.clone()),
            },
        }
    }
}

/// What the engine did (or would do) with the position this tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSignal {
    pub action: String,
    pub should_open: bool,
    pub should_close: bool,
    pub exit_conditions: Vec<String>,
    pub current_pnl_pct: f64,
    pub current_pnl_usd: f64,
    pub reason: String,
}

impl ExecutionSignal {
    #[must_use]
    pub fn wait(reason: impl Into<String>) -> Self {
        Self {
            action: "WAIT".to_string(),
            should_open: false,
            should_close: false,
            exit_conditions: Vec::new(),
            current_pnl_pct: 0.0,
            current_pnl_usd: 0.0,
            reason: reason.into(),
        }
    }
}

/// Where the producing session was in its lifecycle when the snapshot was
/// assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// Session active but no scheduler tick has completed yet.
    Initializing,
    /// Produced by the session's scheduler loop.
    Active,
    /// Produced by a one-shot analysis outside any session.
    Inactive,
}

/// One immutable analysis result. Replaced wholesale every tick; readers
/// receive owned clones and never observe partial updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    pub token: String,
    pub stablecoin: String,
    pub amount: f64,
    pub risk_level: RiskLevel,
    pub model: String,
    pub stop_loss: String,
    pub take_profit: String,
    pub quant_algo: Option<String>,
    pub timestamp: DateTime<Utc>,

    pub recommendation: Recommendation,
    pub confidence: f64,
    pub signal_score: f64,
    pub signal_breakdown: SignalBreakdown,

    pub market: MarketSnapshot,
    pub sentiment: SentimentSummary,
    pub onchain: OnchainSummary,

    pub leverage: LeverageSuggestion,
    pub leverage_hint: crate::decision::LeverageHint,
    pub position: PositionSummary,
    pub execution: ExecutionSignal,
    pub trade_details: TradeDetails,

    pub reasoning: String,
    pub action_message: String,
    pub clear_action: Recommendation,

    pub iteration: u64,
    pub update_id: String,
    pub agent_status: SessionPhase,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_id: Option<String>,
}

impl AnalysisSnapshot {
    /// Owned copy with fresh read-time fields. The decision payload is
    /// untouched; only the poll metadata changes so pollers can tell
    /// responses apart.
    #[must_use]
    pub fn for_poll(&self) -> Self {
        let mut copy = self.clone();
        copy.poll_timestamp = Some(Utc::now());
        copy.poll_id = Some(uuid::Uuid::new_v4().to_string());
        copy
    }
}
