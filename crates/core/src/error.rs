use thiserror::Error;

/// Error taxonomy for the analysis agent.
///
/// `InvalidInput` and the two `NotFound` variants are surfaced to callers;
/// `Provider` errors are recoverable at the scheduler level (the tick is
/// skipped and the previous snapshot stays visible).
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("token {0} not found upstream")]
    TokenNotFound(String),

    #[error("no session found for key {0}")]
    SessionNotFound(String),

    #[error("provider error: {0}")]
    Provider(String),
}

impl AgentError {
    /// True when the error should be reported as a 404 at the HTTP surface.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::TokenNotFound(_) | Self::SessionNotFound(_))
    }
}
