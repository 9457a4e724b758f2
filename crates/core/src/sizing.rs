use crate::decision::{round2, round4, Recommendation};
use crate::error::AgentError;
use serde::{Deserialize, Serialize};

/// What-if horizon for the projected PnL table (5% price move).
const WHAT_IF_MOVE: f64 = 0.05;

/// Session risk appetite chosen at activation. Unrelated to the sentiment
/// model's risk tier: this one drives the leverage actually applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
}

impl RiskLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Moderate => "moderate",
            Self::Aggressive => "aggressive",
        }
    }

    const fn base_leverage(self) -> u32 {
        match self {
            Self::Conservative => 3,
            Self::Moderate => 5,
            Self::Aggressive => 10,
        }
    }

    const fn max_leverage(self) -> u32 {
        match self {
            Self::Conservative => 5,
            Self::Moderate => 10,
            Self::Aggressive => 15,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conservative" => Ok(Self::Conservative),
            "moderate" => Ok(Self::Moderate),
            "aggressive" => Ok(Self::Aggressive),
            other => Err(AgentError::InvalidInput(format!(
                "unknown risk level '{other}', expected conservative|moderate|aggressive"
            ))),
        }
    }
}

/// The leverage applied to a session's position, derived from the session
/// risk level blended with decision confidence and signal strength.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeverageSuggestion {
    pub suggested_leverage: u32,
    pub max_leverage: u32,
    pub base_leverage: u32,
    pub risk_level: RiskLevel,
}

/// Computes leverage for a session.
///
/// `confidence_pct` is on the 0..=100 scale, `signal_strength` the fused
/// score. The blended multiplier weighs confidence at 60% and signal
/// strength (saturating at |50|) at 40%; the scaled result truncates to an
/// integer and is capped per risk tier.
#[must_use]
pub fn leverage_for(
    risk_level: RiskLevel,
    confidence_pct: f64,
    signal_strength: f64,
) -> LeverageSuggestion {
    let confidence_multiplier = (confidence_pct / 100.0).min(1.0);
    let signal_multiplier = (signal_strength.abs() / 50.0).min(1.0);
    let multiplier = confidence_multiplier * 0.6 + signal_multiplier * 0.4;

    let base = risk_level.base_leverage();
    let scale = match risk_level {
        RiskLevel::Aggressive => 0.7 + multiplier * 0.6,
        RiskLevel::Moderate => 0.6 + multiplier * 0.8,
        RiskLevel::Conservative => 0.5 + multiplier * 1.0,
    };
    let suggested = (f64::from(base) * scale) as u32;

    LeverageSuggestion {
        suggested_leverage: suggested.min(risk_level.max_leverage()).max(1),
        max_leverage: risk_level.max_leverage(),
        base_leverage: base,
        risk_level,
    }
}

/// Projected PnL for one direction of the what-if table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceMove {
    pub pnl: f64,
    pub roi_pct: f64,
}

/// Derived figures for the trade a recommendation implies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeDetails {
    pub token: String,
    pub stablecoin: String,
    pub collateral: f64,
    pub suggested_leverage: u32,
    pub position_size_usd: f64,
    pub token_exposure: f64,
    pub current_price: f64,
    pub margin_required: f64,
    pub if_price_moves_5pct_up: PriceMove,
    pub if_price_moves_5pct_down: PriceMove,
}

/// Sizing and what-if figures for a prospective trade backed by
/// stablecoin collateral.
#[must_use]
pub fn trade_details(
    recommendation: Recommendation,
    price: f64,
    leverage: u32,
    collateral: f64,
    token: &str,
    stablecoin: &str,
) -> TradeDetails {
    let lev = f64::from(leverage);
    let position_size = collateral * lev;
    let token_exposure = if price > 0.0 { position_size / price } else { 0.0 };
    let margin_required = if leverage > 0 { collateral / lev } else { collateral };

    let magnitude = collateral * lev * WHAT_IF_MOVE;
    let roi_magnitude = lev * WHAT_IF_MOVE * 100.0;

    // A HOLD projects the LONG-shaped example.
    let up_sign = match recommendation {
        Recommendation::Short => -1.0,
        Recommendation::Long | Recommendation::Hold => 1.0,
    };

    TradeDetails {
        token: token.to_string(),
        stablecoin: stablecoin.to_string(),
        collateral: round2(collateral),
        suggested_leverage: leverage,
        position_size_usd: round2(position_size),
        token_exposure: round4(token_exposure),
        current_price: round4(price),
        margin_required: round2(margin_required),
        if_price_moves_5pct_up: PriceMove {
            pnl: round2(magnitude * up_sign),
            roi_pct: round2(roi_magnitude * up_sign),
        },
        if_price_moves_5pct_down: PriceMove {
            pnl: round2(-magnitude * up_sign),
            roi_pct: round2(-roi_magnitude * up_sign),
        },
    }
}
