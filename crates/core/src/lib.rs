pub mod config;
pub mod config_loader;
pub mod decision;
pub mod error;
pub mod market;
pub mod onchain;
pub mod position;
pub mod sentiment;
pub mod sizing;
pub mod snapshot;
pub mod traits;
pub mod validate;

pub use config::{
    AgentConfig, AppConfig, MarketDataConfig, OnchainConfig, SentimentConfig, ServerConfig,
};
pub use config_loader::ConfigLoader;
pub use decision::{Decision, LeverageHint, Recommendation, SignalBreakdown, SignalFusion};
pub use error::AgentError;
pub use market::{OhlcBar, TokenQuote};
pub use onchain::OnchainSummary;
pub use position::{CloseEvaluation, ExitCondition, OpenDecision, Position, PositionSide};
pub use sentiment::{SentimentRisk, SentimentSummary};
pub use sizing::{LeverageSuggestion, PriceMove, RiskLevel, TradeDetails};
pub use snapshot::{
    AnalysisSnapshot, ExecutionSignal, MarketSnapshot, PositionState, PositionSummary,
    SessionPhase,
};
pub use traits::{MarketDataProvider, OnchainProvider, SentimentProvider};
