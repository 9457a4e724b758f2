use crate::commands::{SessionCommand, SessionStatus};
use anyhow::Result;
use perp_agent_core::AnalysisSnapshot;
use tokio::sync::{mpsc, watch};

/// Cloneable handle to a session actor. Reads are non-blocking: the actor
/// publishes its status and latest snapshot through watch channels, and the
/// last published values remain readable after the actor exits.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
    snapshot_rx: watch::Receiver<Option<AnalysisSnapshot>>,
    status_rx: watch::Receiver<SessionStatus>,
}

impl SessionHandle {
    #[must_use]
    pub(crate) fn new(
        tx: mpsc::Sender<SessionCommand>,
        snapshot_rx: watch::Receiver<Option<AnalysisSnapshot>>,
        status_rx: watch::Receiver<SessionStatus>,
    ) -> Self {
        Self {
            tx,
            snapshot_rx,
            status_rx,
        }
    }

    /// Asks the actor to stop. Succeeds trivially if the actor already
    /// exited (auto-deactivation).
    ///
    /// # Errors
    /// Never fails in practice; kept fallible for command-channel parity.
    pub async fn shutdown(&self) -> Result<()> {
        // An already-stopped actor has dropped its receiver; that is fine.
        let _ = self.tx.send(SessionCommand::Shutdown).await;
        Ok(())
    }

    /// Latest lifecycle status published by the actor.
    #[must_use]
    pub fn latest_status(&self) -> SessionStatus {
        self.status_rx.borrow().clone()
    }

    /// Latest snapshot, or `None` before the first tick completes.
    #[must_use]
    pub fn latest_snapshot(&self) -> Option<AnalysisSnapshot> {
        self.snapshot_rx.borrow().clone()
    }
}
