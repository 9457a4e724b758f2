use chrono::{DateTime, Utc};
use perp_agent_core::{
    validate::{validate_amount, validate_symbol},
    AgentError, Position, RiskLevel,
};
use serde::{Deserialize, Serialize};

#[derive(Debug)]
pub enum SessionCommand {
    Shutdown,
}

/// Per-session trading parameters fixed at activation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub token: String,
    pub stablecoin: String,
    /// Collateral amount, parsed for arithmetic.
    pub amount: f64,
    /// The amount exactly as the caller supplied it. Session identity uses
    /// this text, so "100" and "100.0" name different sessions.
    pub amount_raw: String,
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_stop_loss")]
    pub stop_loss: String,
    #[serde(default = "default_take_profit")]
    pub take_profit: String,
    #[serde(default)]
    pub quant_algo: Option<String>,
}

fn default_model() -> String {
    "GPT-5".to_string()
}

fn default_stop_loss() -> String {
    "90.0".to_string()
}

fn default_take_profit() -> String {
    "150.0".to_string()
}

impl SessionConfig {
    /// Validates the identity fields and builds a config with default
    /// trading parameters. Symbols are upper-cased; the amount keeps its
    /// supplied textual form for the session key.
    ///
    /// # Errors
    /// Returns `InvalidInput` for malformed symbols or a non-positive
    /// amount.
    pub fn try_new(token: &str, stablecoin: &str, amount_raw: &str) -> Result<Self, AgentError> {
        let token = token.trim();
        let stablecoin = stablecoin.trim();
        let amount_raw = amount_raw.trim();
        validate_symbol(token)?;
        validate_symbol(stablecoin)?;
        let amount: f64 = amount_raw
            .parse()
            .map_err(|_| AgentError::InvalidInput(format!("bad amount '{amount_raw}'")))?;
        validate_amount(amount)?;

        Ok(Self {
            token: token.to_uppercase(),
            stablecoin: stablecoin.to_uppercase(),
            amount,
            amount_raw: amount_raw.to_string(),
            risk_level: RiskLevel::default(),
            model: default_model(),
            stop_loss: default_stop_loss(),
            take_profit: default_take_profit(),
            quant_algo: None,
        })
    }

    /// Session identity: the exact (token, stablecoin, amount) text.
    #[must_use]
    pub fn session_key(&self) -> String {
        format!("{}_{}_{}", self.token, self.stablecoin, self.amount_raw)
    }
}

/// Point-in-time view of a session's lifecycle, published by its actor.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub session_key: String,
    pub activated: bool,
    pub token: String,
    pub stablecoin: String,
    pub amount: f64,
    pub risk_level: RiskLevel,
    pub activated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deactivated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deactivation_reason: Option<String>,
    /// True while a position is open.
    pub has_position: bool,
    /// Last known position, open or closed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_key_preserves_the_supplied_amount_text() {
        let plain = SessionConfig::try_new("apt", "usdc", "100").unwrap();
        let decimal = SessionConfig::try_new("apt", "usdc", "100.0").unwrap();
        assert_eq!(plain.session_key(), "APT_USDC_100");
        assert_eq!(decimal.session_key(), "APT_USDC_100.0");
        assert_ne!(plain.session_key(), decimal.session_key());
        assert!((plain.amount - decimal.amount).abs() < f64::EPSILON);
    }

    #[test]
    fn construction_rejects_bad_identity_fields() {
        assert!(SessionConfig::try_new("", "USDC", "100").is_err());
        assert!(SessionConfig::try_new("APT", "USDC", "lots").is_err());
        assert!(SessionConfig::try_new("APT", "USDC", "-1").is_err());
        assert!(SessionConfig::try_new("APT", "USD-C", "100").is_err());
    }

    #[test]
    fn defaults_cover_the_trading_parameters() {
        let config = SessionConfig::try_new("APT", "USDC", "250.5").unwrap();
        assert_eq!(config.risk_level, RiskLevel::Moderate);
        assert_eq!(config.model, "GPT-5");
        assert_eq!(config.stop_loss, "90.0");
        assert_eq!(config.take_profit, "150.0");
        assert!(config.quant_algo.is_none());
    }
}
