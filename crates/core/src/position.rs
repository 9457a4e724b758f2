use crate::decision::{round2, Recommendation, LONG_THRESHOLD};
use crate::error::AgentError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum decision confidence (percent) required to open.
pub const MIN_OPEN_CONFIDENCE: f64 = 60.0;
/// Minimum absolute signal score required to open.
pub const MIN_OPEN_SIGNAL: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Long => "LONG",
            Self::Short => "SHORT",
        }
    }
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A simulated leveraged position. Exactly one may be open per session;
/// once closed the instance is terminal and a new entry creates a fresh one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub token: String,
    pub stablecoin: String,
    pub side: PositionSide,
    pub entry_price: f64,
    pub current_price: f64,
    pub leverage: u32,
    pub collateral: f64,
    pub position_size: f64,
    pub pnl_usd: f64,
    pub pnl_pct: f64,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub exit_price: Option<f64>,
    pub close_reason: Option<String>,
}

impl Position {
    #[must_use]
    pub fn open(
        token: &str,
        stablecoin: &str,
        side: PositionSide,
        entry_price: f64,
        leverage: u32,
        collateral: f64,
    ) -> Self {
        Self {
            token: token.to_string(),
            stablecoin: stablecoin.to_string(),
            side,
            entry_price,
            current_price: entry_price,
            leverage,
            collateral,
            position_size: collateral * f64::from(leverage),
            pnl_usd: 0.0,
            pnl_pct: 0.0,
            opened_at: Utc::now(),
            closed_at: None,
            exit_price: None,
            close_reason: None,
        }
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }

    /// Leveraged PnL at `current_price`, as (price_change_pct, pnl_pct, pnl_usd).
    #[must_use]
    pub fn pnl_at(&self, current_price: f64) -> (f64, f64, f64) {
        let price_change_pct = match self.side {
            PositionSide::Long => (current_price - self.entry_price) / self.entry_price * 100.0,
            PositionSide::Short => (self.entry_price - current_price) / self.entry_price * 100.0,
        };
        let pnl_pct = price_change_pct * f64::from(self.leverage);
        let pnl_usd = self.collateral * pnl_pct / 100.0;
        (price_change_pct, pnl_pct, pnl_usd)
    }

    /// Refresh the marked price and stored PnL figures.
    pub fn mark(&mut self, current_price: f64) {
        let (_, pnl_pct, pnl_usd) = self.pnl_at(current_price);
        self.current_price = current_price;
        self.pnl_pct = round2(pnl_pct);
        self.pnl_usd = round2(pnl_usd);
    }

    /// Close at `exit_price` with the joined exit reason. Terminal.
    pub fn close(&mut self, exit_price: f64, reason: String) {
        self.mark(exit_price);
        self.exit_price = Some(exit_price);
        self.closed_at = Some(Utc::now());
        self.close_reason = Some(reason);
    }
}

/// Exit rules matched during a close evaluation. Every matched rule is
/// recorded, not just the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExitCondition {
    TakeProfit { roi_pct: f64 },
    StopLoss { roi_pct: f64 },
    ReversalToShort,
    ReversalToLong,
    SignalWeakened,
}

impl ExitCondition {
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::TakeProfit { roi_pct } => format!("take_profit_{roi_pct}pct"),
            Self::StopLoss { roi_pct } => format!("stop_loss_{}pct", roi_pct.abs()),
            Self::ReversalToShort => "signal_reversal_to_short".to_string(),
            Self::ReversalToLong => "signal_reversal_to_long".to_string(),
            Self::SignalWeakened => "signal_weakened".to_string(),
        }
    }

    /// Take-profit and stop-loss exits trip the session circuit breaker;
    /// signal-driven exits do not.
    #[must_use]
    pub const fn trips_circuit_breaker(&self) -> bool {
        matches!(self, Self::TakeProfit { .. } | Self::StopLoss { .. })
    }
}

/// Outcome of evaluating an open position against the latest decision.
#[derive(Debug, Clone)]
pub struct CloseEvaluation {
    pub conditions: Vec<ExitCondition>,
    pub price_change_pct: f64,
    pub pnl_pct: f64,
    pub pnl_usd: f64,
}

impl CloseEvaluation {
    #[must_use]
    pub fn should_close(&self) -> bool {
        !self.conditions.is_empty()
    }

    #[must_use]
    pub fn reason(&self) -> String {
        self.conditions
            .iter()
            .map(ExitCondition::label)
            .collect::<Vec<_>>()
            .join(", ")
    }

    #[must_use]
    pub fn trips_circuit_breaker(&self) -> bool {
        self.conditions.iter().any(ExitCondition::trips_circuit_breaker)
    }
}

/// Evaluates every exit rule for an open position. All matched conditions
/// are collected so the close reason reflects each of them.
#[must_use]
pub fn evaluate_exit(
    position: &Position,
    current_price: f64,
    recommendation: Recommendation,
    signal_score: f64,
    stop_loss_roi: f64,
    take_profit_roi: f64,
) -> CloseEvaluation {
    let (price_change_pct, pnl_pct, pnl_usd) = position.pnl_at(current_price);
    let mut conditions = Vec::new();

    if pnl_pct >= take_profit_roi {
        conditions.push(ExitCondition::TakeProfit { roi_pct: take_profit_roi });
    }
    if pnl_pct <= stop_loss_roi {
        conditions.push(ExitCondition::StopLoss { roi_pct: stop_loss_roi });
    }
    match (position.side, recommendation) {
        (PositionSide::Long, Recommendation::Short) => {
            conditions.push(ExitCondition::ReversalToShort);
        }
        (PositionSide::Short, Recommendation::Long) => {
            conditions.push(ExitCondition::ReversalToLong);
        }
        _ => {}
    }
    if recommendation == Recommendation::Hold && signal_score.abs() < LONG_THRESHOLD {
        conditions.push(ExitCondition::SignalWeakened);
    }

    CloseEvaluation {
        conditions,
        price_change_pct,
        pnl_pct,
        pnl_usd,
    }
}

/// Entry gate result.
#[derive(Debug, Clone)]
pub struct OpenDecision {
    pub should_open: bool,
    pub side: Option<PositionSide>,
    pub action: String,
    pub reason: String,
}

/// Decides whether a new position may be opened. Requires no open position,
/// a directional recommendation, and both confidence and signal strength
/// above their entry floors.
#[must_use]
pub fn should_open(
    recommendation: Recommendation,
    confidence_pct: f64,
    signal_score: f64,
    current: Option<&Position>,
) -> OpenDecision {
    if current.is_some_and(Position::is_open) {
        return OpenDecision {
            should_open: false,
            side: None,
            action: "monitor".to_string(),
            reason: "Position already open".to_string(),
        };
    }

    let side = match recommendation {
        Recommendation::Long => PositionSide::Long,
        Recommendation::Short => PositionSide::Short,
        Recommendation::Hold => {
            return OpenDecision {
                should_open: false,
                side: None,
                action: "wait".to_string(),
                reason: "HOLD signal - no position".to_string(),
            };
        }
    };

    if confidence_pct >= MIN_OPEN_CONFIDENCE && signal_score.abs() >= MIN_OPEN_SIGNAL {
        OpenDecision {
            should_open: true,
            side: Some(side),
            action: format!("OPEN_{recommendation}"),
            reason: format!("Strong {recommendation} signal"),
        }
    } else {
        OpenDecision {
            should_open: false,
            side: None,
            action: "wait".to_string(),
            reason: format!(
                "Signal not strong enough (Confidence: {confidence_pct}%, Signal: {signal_score:.2})"
            ),
        }
    }
}

/// Converts percent-of-entry-price strings into ROI thresholds.
///
/// A stop-loss of "90.0" (exit at 90% of entry) becomes -10.0% ROI; a
/// take-profit of "150.0" becomes +50.0% ROI.
pub fn roi_thresholds(stop_loss: &str, take_profit: &str) -> Result<(f64, f64), AgentError> {
    let stop_loss_pct: f64 = stop_loss
        .trim()
        .parse()
        .map_err(|_| AgentError::InvalidInput(format!("bad stop_loss '{stop_loss}'")))?;
    let take_profit_pct: f64 = take_profit
        .trim()
        .parse()
        .map_err(|_| AgentError::InvalidInput(format!("bad take_profit '{take_profit}'")))?;
    if !stop_loss_pct.is_finite() || !take_profit_pct.is_finite() {
        return Err(AgentError::InvalidInput(
            "stop_loss/take_profit must be finite".to_string(),
        ));
    }
    Ok((-(100.0 - stop_loss_pct), take_profit_pct - 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_position() -> Position {
        Position::open("APT", "USDC", PositionSide::Long, 100.0, 5, 100.0)
    }

    #[test]
    fn roi_conversion_matches_percent_of_entry_semantics() {
        let (sl, tp) = roi_thresholds("90.0", "150.0").unwrap();
        assert!((sl + 10.0).abs() < f64::EPSILON, "stop_loss_roi was {sl}");
        assert!((tp - 50.0).abs() < f64::EPSILON, "take_profit_roi was {tp}");
    }

    #[test]
    fn roi_conversion_rejects_garbage() {
        assert!(roi_thresholds("ninety", "150.0").is_err());
        assert!(roi_thresholds("90.0", "").is_err());
    }

    #[test]
    fn long_pnl_is_leveraged_price_change() {
        let pos = long_position();
        let (price_change, pnl_pct, pnl_usd) = pos.pnl_at(105.0);
        assert!((price_change - 5.0).abs() < f64::EPSILON);
        assert!((pnl_pct - 25.0).abs() < f64::EPSILON);
        assert!((pnl_usd - 25.0).abs() < f64::EPSILON); // 0.25 x 100 collateral
    }

    #[test]
    fn short_pnl_profits_when_price_falls() {
        let pos = Position::open("APT", "USDC", PositionSide::Short, 100.0, 5, 100.0);
        let (_, pnl_pct, _) = pos.pnl_at(95.0);
        assert!((pnl_pct - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn take_profit_exit_trips_circuit_breaker() {
        let pos = long_position();
        // +12% price * 5x = +60% ROI >= +50% take profit
        let eval = evaluate_exit(&pos, 112.0, Recommendation::Long, 20.0, -10.0, 50.0);
        assert!(eval.should_close());
        assert!(eval.trips_circuit_breaker());
        assert!(eval.reason().contains("take_profit"));
    }

    #[test]
    fn stop_loss_exit_trips_circuit_breaker() {
        let pos = long_position();
        // -3% price * 5x = -15% ROI <= -10% stop loss
        let eval = evaluate_exit(&pos, 97.0, Recommendation::Long, 20.0, -10.0, 50.0);
        assert!(eval.should_close());
        assert!(eval.trips_circuit_breaker());
        assert!(eval.reason().contains("stop_loss"));
    }

    #[test]
    fn reversal_exit_does_not_trip_circuit_breaker() {
        let pos = long_position();
        let eval = evaluate_exit(&pos, 100.5, Recommendation::Short, -30.0, -10.0, 50.0);
        assert!(eval.should_close());
        assert!(!eval.trips_circuit_breaker());
        assert_eq!(eval.reason(), "signal_reversal_to_short");
    }

    #[test]
    fn weakened_signal_closes_without_tripping() {
        let pos = long_position();
        let eval = evaluate_exit(&pos, 100.0, Recommendation::Hold, 4.0, -10.0, 50.0);
        assert_eq!(eval.conditions, vec![ExitCondition::SignalWeakened]);
        assert!(!eval.trips_circuit_breaker());
    }

    #[test]
    fn every_matched_condition_is_recorded() {
        let pos = long_position();
        // Price collapse: stop loss AND reversal AND weakened all at once.
        let eval = evaluate_exit(&pos, 90.0, Recommendation::Hold, 2.0, -10.0, 50.0);
        assert_eq!(eval.conditions.len(), 2); // stop loss + weakened
        let reason = eval.reason();
        assert!(reason.contains("stop_loss"));
        assert!(reason.contains("signal_weakened"));
    }

    #[test]
    fn open_requires_confidence_and_signal_floors() {
        let ok = should_open(Recommendation::Long, 60.0, 15.0, None);
        assert!(ok.should_open);
        assert_eq!(ok.side, Some(PositionSide::Long));
        assert_eq!(ok.action, "OPEN_LONG");

        let weak_confidence = should_open(Recommendation::Long, 59.9, 40.0, None);
        assert!(!weak_confidence.should_open);

        let weak_signal = should_open(Recommendation::Long, 80.0, 14.9, None);
        assert!(!weak_signal.should_open);
    }

    #[test]
    fn open_is_blocked_while_a_position_is_open() {
        let pos = long_position();
        let blocked = should_open(Recommendation::Short, 90.0, -40.0, Some(&pos));
        assert!(!blocked.should_open);
        assert_eq!(blocked.action, "monitor");
    }

    #[test]
    fn open_is_allowed_after_the_previous_close() {
        let mut pos = long_position();
        pos.close(110.0, "take_profit_50pct".to_string());
        let allowed = should_open(Recommendation::Short, 90.0, -40.0, Some(&pos));
        assert!(allowed.should_open);
    }

    #[test]
    fn hold_never_opens() {
        let hold = should_open(Recommendation::Hold, 100.0, 0.0, None);
        assert!(!hold.should_open);
    }

    #[test]
    fn close_is_terminal_and_records_reason() {
        let mut pos = long_position();
        pos.close(105.0, "signal_weakened".to_string());
        assert!(!pos.is_open());
        assert_eq!(pos.exit_price, Some(105.0));
        assert_eq!(pos.close_reason.as_deref(), Some("signal_weakened"));
        assert!((pos.pnl_pct - 25.0).abs() < f64::EPSILON);
    }
}
