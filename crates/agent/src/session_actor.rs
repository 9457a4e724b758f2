use crate::analysis::{run_cycle, ProviderSet};
use crate::commands::{SessionCommand, SessionConfig, SessionStatus};
use crate::simulator::PriceSimulator;
use chrono::{DateTime, Utc};
use perp_agent_core::{AnalysisSnapshot, Position, SessionPhase};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

/// Actor owning every piece of one session's mutable state: position,
/// price history, iteration counter, and the published snapshot. Because a
/// single task owns all of it, each tick's outputs become visible together
/// and readers never see a half-updated result.
pub struct SessionActor {
    config: SessionConfig,
    providers: ProviderSet,
    rx: mpsc::Receiver<SessionCommand>,
    snapshot_tx: watch::Sender<Option<AnalysisSnapshot>>,
    status_tx: watch::Sender<SessionStatus>,

    position: Option<Position>,
    simulator: PriceSimulator,
    iteration: u64,

    activated: bool,
    activated_at: DateTime<Utc>,
    deactivated_at: Option<DateTime<Utc>>,
    deactivation_reason: Option<String>,

    tick_interval: Duration,
}

impl SessionActor {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: SessionConfig,
        providers: ProviderSet,
        rx: mpsc::Receiver<SessionCommand>,
        snapshot_tx: watch::Sender<Option<AnalysisSnapshot>>,
        status_tx: watch::Sender<SessionStatus>,
        activated_at: DateTime<Utc>,
        tick_interval: Duration,
        price_history_capacity: usize,
    ) -> Self {
        Self {
            config,
            providers,
            rx,
            snapshot_tx,
            status_tx,
            position: None,
            simulator: PriceSimulator::new(price_history_capacity),
            iteration: 0,
            activated: true,
            activated_at,
            deactivated_at: None,
            deactivation_reason: None,
            tick_interval,
        }
    }

    /// Runs the session: one analysis cycle per tick until the session is
    /// deactivated, servicing shutdown commands between cycles.
    pub async fn run(mut self) {
        let key = self.config.session_key();
        tracing::info!(session = %key, "Session scheduler started");
        self.publish_status();

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = self.rx.recv() => {
                    // A dropped sender means the registry purged us.
                    match cmd {
                        Some(SessionCommand::Shutdown) | None => {
                            self.activated = false;
                            self.deactivated_at = Some(Utc::now());
                            self.publish_status();
                            break;
                        }
                    }
                }
                _ = ticker.tick() => {
                    self.tick().await;
                    if !self.activated {
                        // Circuit breaker tripped mid-tick: exit now
                        // instead of sleeping until the next tick.
                        break;
                    }
                }
            }
        }

        tracing::info!(session = %key, "Session scheduler stopped");
    }

    async fn tick(&mut self) {
        self.iteration += 1;
        let outcome = run_cycle(
            &self.providers,
            &self.config,
            &mut self.position,
            &mut self.simulator,
            self.iteration,
            SessionPhase::Active,
        )
        .await;

        match outcome {
            Ok(outcome) => {
                if outcome.circuit_tripped {
                    let reason = self
                        .position
                        .as_ref()
                        .and_then(|p| p.close_reason.clone())
                        .unwrap_or_else(|| "risk threshold hit".to_string());
                    tracing::warn!(
                        session = %self.config.session_key(),
                        %reason,
                        "Exit threshold hit, deactivating session"
                    );
                    self.activated = false;
                    self.deactivated_at = Some(Utc::now());
                    self.deactivation_reason = Some(reason);
                }

                // Replace the published snapshot wholesale; never mutate
                // the previous one in place.
                let _ = self.snapshot_tx.send(Some(outcome.snapshot));
                self.publish_status();
            }
            Err(e) => {
                // The tick is abandoned; the previous snapshot stays
                // visible and the loop continues.
                tracing::warn!(
                    session = %self.config.session_key(),
                    iteration = self.iteration,
                    error = %e,
                    "Analysis tick failed, keeping previous snapshot"
                );
            }
        }
    }

    fn current_status(&self) -> SessionStatus {
        SessionStatus {
            session_key: self.config.session_key(),
            activated: self.activated,
            token: self.config.token.clone(),
            stablecoin: self.config.stablecoin.clone(),
            amount: self.config.amount,
            risk_level: self.config.risk_level,
            activated_at: self.activated_at,
            deactivated_at: self.deactivated_at,
            deactivation_reason: self.deactivation_reason.clone(),
            has_position: self.position.as_ref().is_some_and(Position::is_open),
            position: self.position.clone(),
        }
    }

    fn publish_status(&self) {
        let _ = self.status_tx.send(self.current_status());
    }
}
