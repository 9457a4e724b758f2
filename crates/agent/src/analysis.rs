//! The per-tick analysis pipeline.
//!
//! One cycle pulls fresh collaborator data, fuses it into a decision,
//! advances the position state machine, steps the price simulator, and
//! assembles a complete snapshot. The scheduler runs it once per tick; the
//! read path runs it once, synchronously, for sessions with no scheduler.

use crate::commands::SessionConfig;
use crate::simulator::PriceSimulator;
use chrono::Utc;
use perp_agent_core::{
    position::{evaluate_exit, roi_thresholds, should_open, Position},
    sizing::{leverage_for, trade_details, LeverageSuggestion},
    AgentError, AnalysisSnapshot, ExecutionSignal, LeverageHint, MarketDataProvider,
    MarketSnapshot, OnchainProvider, OnchainSummary, PositionSummary, Recommendation,
    SentimentProvider, SentimentRisk, SentimentSummary, SessionPhase, SignalBreakdown,
    SignalFusion, TokenQuote,
};
use std::sync::Arc;

/// The three collaborators every cycle consults.
#[derive(Clone)]
pub struct ProviderSet {
    pub market: Arc<dyn MarketDataProvider>,
    pub sentiment: Arc<dyn SentimentProvider>,
    pub onchain: Arc<dyn OnchainProvider>,
}

/// Result of one analysis cycle.
pub struct CycleOutcome {
    pub snapshot: AnalysisSnapshot,
    /// True when this cycle closed the position on a take-profit or
    /// stop-loss; the owning session must deactivate in the same step.
    pub circuit_tripped: bool,
}

/// Runs one full analysis cycle.
///
/// Position state lives in `position` and survives across cycles for a
/// scheduled session; the one-shot path passes a transient slot. A quote
/// failure aborts the cycle (`TokenNotFound`/`Provider`); sentiment and
/// on-chain inputs cannot fail by contract.
///
/// # Errors
/// Returns `TokenNotFound` when the upstream has no listing, `Provider` on
/// transport failures, `InvalidInput` when the configured stop-loss or
/// take-profit strings do not parse.
pub async fn run_cycle(
    providers: &ProviderSet,
    config: &SessionConfig,
    position: &mut Option<Position>,
    simulator: &mut PriceSimulator,
    iteration: u64,
    phase: SessionPhase,
) -> Result<CycleOutcome, AgentError> {
    let quote = providers.market.quote(&config.token).await?;
    let sentiment = providers
        .sentiment
        .analyze(&config.token, &quote.name, &quote, &config.model)
        .await;
    let onchain = providers.onchain.analyze(&config.token).await;

    let decision = SignalFusion::evaluate(&quote, &sentiment, &onchain);
    let leverage = leverage_for(config.risk_level, decision.confidence, decision.final_score);
    let (stop_loss_roi, take_profit_roi) = roi_thresholds(&config.stop_loss, &config.take_profit)?;

    let mut circuit_tripped = false;
    let execution = if let Some(pos) = position.as_mut().filter(|p| p.is_open()) {
        pos.mark(quote.price);
        let eval = evaluate_exit(
            pos,
            quote.price,
            decision.recommendation,
            decision.final_score,
            stop_loss_roi,
            take_profit_roi,
        );

        let mut signal = ExecutionSignal {
            action: if eval.should_close() { "CLOSE" } else { "HOLD_POSITION" }.to_string(),
            should_open: false,
            should_close: eval.should_close(),
            exit_conditions: eval.conditions.iter().map(|c| c.label()).collect(),
            current_pnl_pct: eval.pnl_pct,
            current_pnl_usd: eval.pnl_usd,
            reason: String::new(),
        };

        if eval.should_close() {
            let reason = eval.reason();
            pos.close(quote.price, reason.clone());
            signal.reason = reason;
            circuit_tripped = eval.trips_circuit_breaker();
        }
        signal
    } else {
        let open = should_open(
            decision.recommendation,
            decision.confidence,
            decision.final_score,
            position.as_ref(),
        );
        if let (true, Some(side)) = (open.should_open, open.side) {
            *position = Some(Position::open(
                &config.token,
                &config.stablecoin,
                side,
                quote.price,
                leverage.suggested_leverage,
                config.amount,
            ));
            ExecutionSignal {
                action: format!("OPENED_{}", decision.recommendation),
                should_open: true,
                should_close: false,
                exit_conditions: Vec::new(),
                current_pnl_pct: 0.0,
                current_pnl_usd: 0.0,
                reason: open.reason,
            }
        } else {
            ExecutionSignal {
                action: open.action,
                should_open: false,
                should_close: false,
                exit_conditions: Vec::new(),
                current_pnl_pct: 0.0,
                current_pnl_usd: 0.0,
                reason: open.reason,
            }
        }
    };

    let now = Utc::now();
    let live_price = simulator.step(quote.price, quote.percent_change_1h, now);

    let trade = trade_details(
        decision.recommendation,
        quote.price,
        leverage.suggested_leverage,
        config.amount,
        &config.token,
        &config.stablecoin,
    );

    let snapshot = AnalysisSnapshot {
        token: config.token.clone(),
        stablecoin: config.stablecoin.clone(),
        amount: config.amount,
        risk_level: config.risk_level,
        model: config.model.clone(),
        stop_loss: config.stop_loss.clone(),
        take_profit: config.take_profit.clone(),
        quant_algo: config.quant_algo.clone(),
        timestamp: now,
        recommendation: decision.recommendation,
        confidence: decision.confidence,
        signal_score: decision.final_score,
        signal_breakdown: decision.breakdown,
        market: market_snapshot(&quote, live_price),
        sentiment,
        onchain,
        leverage,
        leverage_hint: decision.leverage_hint,
        position: PositionSummary::from_position(position.as_ref()),
        execution,
        trade_details: trade,
        reasoning: decision.reasoning,
        action_message: action_message(
            decision.recommendation,
            &config.token,
            decision.confidence,
            quote.price,
        ),
        clear_action: decision.recommendation,
        iteration,
        update_id: format!("{}_{}", iteration, uuid::Uuid::new_v4()),
        agent_status: phase,
        poll_timestamp: None,
        poll_id: None,
    };

    Ok(CycleOutcome {
        snapshot,
        circuit_tripped,
    })
}

fn market_snapshot(quote: &TokenQuote, live_price: f64) -> MarketSnapshot {
    MarketSnapshot {
        price: live_price,
        live_price,
        reference_price: quote.price,
        market_cap: quote.market_cap,
        volume_24h: quote.volume_24h,
        percent_change_1h: quote.percent_change_1h,
        percent_change_24h: quote.percent_change_24h,
        percent_change_7d: quote.percent_change_7d,
    }
}

fn action_message(
    recommendation: Recommendation,
    token: &str,
    confidence: f64,
    price: f64,
) -> String {
    match recommendation {
        Recommendation::Long => {
            format!("GO LONG {token} | Confidence: {confidence}% | Price: ${price:.4}")
        }
        Recommendation::Short => {
            format!("GO SHORT {token} | Confidence: {confidence}% | Price: ${price:.4}")
        }
        Recommendation::Hold => {
            format!("HOLD - Wait for better signal | Confidence: {confidence}% | Price: ${price:.4}")
        }
    }
}

/// Placeholder served while a session is activated but its first tick has
/// not completed: zeroed signal blocks, explicit "initializing" status.
#[must_use]
pub fn initializing_snapshot(config: &SessionConfig) -> AnalysisSnapshot {
    AnalysisSnapshot {
        token: config.token.clone(),
        stablecoin: config.stablecoin.clone(),
        amount: config.amount,
        risk_level: config.risk_level,
        model: config.model.clone(),
        stop_loss: config.stop_loss.clone(),
        take_profit: config.take_profit.clone(),
        quant_algo: config.quant_algo.clone(),
        timestamp: Utc::now(),
        recommendation: Recommendation::Hold,
        confidence: 0.0,
        signal_score: 0.0,
        signal_breakdown: SignalBreakdown {
            sentiment_score: 0.0,
            market_momentum: 0.0,
            onchain_signal: 0.0,
            risk_level: SentimentRisk::Medium,
        },
        market: MarketSnapshot::zeroed(),
        sentiment: SentimentSummary::neutral("waiting for first analysis"),
        onchain: OnchainSummary::neutral(),
        leverage: LeverageSuggestion {
            suggested_leverage: 1,
            max_leverage: 1,
            base_leverage: 1,
            risk_level: config.risk_level,
        },
        leverage_hint: LeverageHint {
            suggested_leverage: 1,
            max_safe_leverage: 1,
        },
        position: PositionSummary::none(),
        execution: ExecutionSignal::wait("waiting for first analysis"),
        trade_details: trade_details(
            Recommendation::Hold,
            0.0,
            1,
            config.amount,
            &config.token,
            &config.stablecoin,
        ),
        reasoning: "Session activated, waiting for first analysis to complete".to_string(),
        action_message: "Session activated, waiting for first analysis...".to_string(),
        clear_action: Recommendation::Hold,
        iteration: 0,
        update_id: format!("0_{}", uuid::Uuid::new_v4()),
        agent_status: SessionPhase::Initializing,
        poll_timestamp: None,
        poll_id: None,
    }
}
