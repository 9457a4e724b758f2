use crate::analysis::{initializing_snapshot, run_cycle, ProviderSet};
use crate::commands::{SessionConfig, SessionStatus};
use crate::session_actor::SessionActor;
use crate::session_handle::SessionHandle;
use crate::simulator::PriceSimulator;
use chrono::{DateTime, Utc};
use perp_agent_core::{AgentConfig, AgentError, AnalysisSnapshot, OhlcBar, SessionPhase};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;

struct SessionEntry {
    handle: SessionHandle,
    task: JoinHandle<()>,
}

/// Outcome of an activation request.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Activation {
    Activated {
        session_key: String,
        activated_at: DateTime<Utc>,
    },
    /// The session was already running; nothing was reset or restarted.
    AlreadyActivated {
        session_key: String,
        activated_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct Deactivation {
    pub session_key: String,
    pub deactivated_at: DateTime<Utc>,
}

/// Owns session lifecycle: spawning one actor task per activated session,
/// idempotent re-activation, and teardown that awaits the actor before its
/// state is dropped.
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
    providers: ProviderSet,
    agent_config: AgentConfig,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(providers: ProviderSet, agent_config: AgentConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            providers,
            agent_config,
        }
    }

    /// Activates a session and starts its scheduler task.
    ///
    /// Idempotent: re-activating a running session returns
    /// `AlreadyActivated` with the original activation timestamp and leaves
    /// the scheduler, config, and any open position untouched. A session
    /// that auto-deactivated (and was never explicitly purged) is replaced
    /// by a fresh one.
    ///
    /// # Errors
    /// Returns `InvalidInput` if the config carries unparsable stop-loss or
    /// take-profit strings.
    pub async fn activate(&self, config: SessionConfig) -> Result<Activation, AgentError> {
        // Surface bad exit thresholds at activation, not on the first tick.
        perp_agent_core::position::roi_thresholds(&config.stop_loss, &config.take_profit)?;

        let key = config.session_key();
        let mut sessions = self.sessions.write().await;

        if let Some(entry) = sessions.get(&key) {
            let status = entry.handle.latest_status();
            if status.activated {
                tracing::info!(session = %key, "Activation request for already-active session");
                return Ok(Activation::AlreadyActivated {
                    session_key: key,
                    activated_at: status.activated_at,
                });
            }
            // Auto-deactivated: its task has exited; replace the entry.
            sessions.remove(&key);
        }

        let activated_at = Utc::now();
        let (tx, rx) = mpsc::channel(8);
        let (snapshot_tx, snapshot_rx) = watch::channel(None);

        let initial_status = SessionStatus {
            session_key: key.clone(),
            activated: true,
            token: config.token.clone(),
            stablecoin: config.stablecoin.clone(),
            amount: config.amount,
            risk_level: config.risk_level,
            activated_at,
            deactivated_at: None,
            deactivation_reason: None,
            has_position: false,
            position: None,
        };
        let (status_tx, status_rx) = watch::channel(initial_status);

        let actor = SessionActor::new(
            config,
            self.providers.clone(),
            rx,
            snapshot_tx,
            status_tx,
            activated_at,
            Duration::from_millis(self.agent_config.tick_interval_ms),
            self.agent_config.price_history_capacity,
        );
        let task = tokio::spawn(actor.run());

        let handle = SessionHandle::new(tx, snapshot_rx, status_rx);
        sessions.insert(key.clone(), SessionEntry { handle, task });
        tracing::info!(session = %key, "Session activated");

        Ok(Activation::Activated {
            session_key: key,
            activated_at,
        })
    }

    /// Deactivates a session and purges all its state.
    ///
    /// The actor task is awaited before the entry is dropped, so no
    /// in-flight tick can publish after the purge; the snapshot, price
    /// history, and position all die with the actor.
    ///
    /// # Errors
    /// Returns `SessionNotFound` for an unknown key.
    pub async fn deactivate(&self, key: &str) -> Result<Deactivation, AgentError> {
        let entry = self
            .sessions
            .write()
            .await
            .remove(key)
            .ok_or_else(|| AgentError::SessionNotFound(key.to_string()))?;

        let _ = entry.handle.shutdown().await;
        if let Err(e) = entry.task.await {
            tracing::error!(session = %key, error = %e, "Session task ended abnormally");
        }
        tracing::info!(session = %key, "Session deactivated and purged");

        Ok(Deactivation {
            session_key: key.to_string(),
            deactivated_at: Utc::now(),
        })
    }

    /// Lifecycle status for a session, if one exists. Auto-deactivated
    /// sessions keep reporting (with their deactivation reason) until an
    /// explicit deactivate purges them.
    pub async fn status(&self, key: &str) -> Option<SessionStatus> {
        self.sessions
            .read()
            .await
            .get(key)
            .map(|entry| entry.handle.latest_status())
    }

    /// The read path for polling clients.
    ///
    /// Active session with a snapshot: an owned copy with fresh poll
    /// fields. Active but not yet ticked: the initializing placeholder.
    /// Anything else: one synchronous analysis cycle, uncached.
    ///
    /// # Errors
    /// One-shot analysis surfaces `TokenNotFound` and transport errors;
    /// the cached path cannot fail.
    pub async fn analyze(&self, config: &SessionConfig) -> Result<AnalysisSnapshot, AgentError> {
        let key = config.session_key();

        if let Some(entry) = self.sessions.read().await.get(&key) {
            let status = entry.handle.latest_status();
            if status.activated {
                return Ok(entry
                    .handle
                    .latest_snapshot()
                    .map_or_else(|| initializing_snapshot(config), |snap| snap.for_poll()));
            }
        }

        self.one_shot(config).await
    }

    async fn one_shot(&self, config: &SessionConfig) -> Result<AnalysisSnapshot, AgentError> {
        let mut position = None;
        let mut simulator = PriceSimulator::new(self.agent_config.price_history_capacity);
        let outcome = run_cycle(
            &self.providers,
            config,
            &mut position,
            &mut simulator,
            0,
            SessionPhase::Inactive,
        )
        .await?;
        Ok(outcome.snapshot)
    }

    /// Historical OHLC passthrough to the market-data collaborator.
    ///
    /// # Errors
    /// Propagates validation and provider errors unchanged.
    pub async fn historical(&self, token: &str, days: u32) -> Result<Vec<OhlcBar>, AgentError> {
        perp_agent_core::validate::validate_symbol(token.trim())?;
        self.providers
            .market
            .historical(&token.trim().to_uppercase(), days)
            .await
    }

    /// Keys of every known session, active or auto-deactivated.
    pub async fn session_keys(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }

    /// Stops every session actor. Used at server shutdown.
    pub async fn shutdown_all(&self) {
        let entries: Vec<(String, SessionEntry)> =
            self.sessions.write().await.drain().collect();
        for (key, entry) in entries {
            let _ = entry.handle.shutdown().await;
            if let Err(e) = entry.task.await {
                tracing::error!(session = %key, error = %e, "Session task ended abnormally");
            }
        }
    }
}
