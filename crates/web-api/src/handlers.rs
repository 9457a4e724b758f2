use crate::server::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use perp_agent_core::{AgentError, AnalysisSnapshot, OhlcBar, RiskLevel};
use perp_agent_orchestrator::{Activation, Deactivation, SessionConfig, SessionStatus};
use serde::{Deserialize, Serialize};

/// Body shared by the activate and analyze endpoints.
///
/// `amount` is kept as a raw JSON number: the session key is built from
/// its original text, so "100" and "100.0" address different sessions.
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub token: String,
    #[serde(default = "default_stablecoin")]
    pub stablecoin: String,
    pub amount: serde_json::Number,
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub stop_loss: Option<String>,
    #[serde(default)]
    pub take_profit: Option<String>,
    #[serde(default)]
    pub quant_algo: Option<String>,
}

fn default_stablecoin() -> String {
    "USDC".to_string()
}

impl AnalyzeRequest {
    fn into_session_config(self) -> Result<SessionConfig, AgentError> {
        let mut config =
            SessionConfig::try_new(&self.token, &self.stablecoin, &self.amount.to_string())?;
        config.risk_level = self.risk_level;
        if let Some(model) = self.model {
            config.model = model;
        }
        if let Some(stop_loss) = self.stop_loss {
            config.stop_loss = stop_loss;
        }
        if let Some(take_profit) = self.take_profit {
            config.take_profit = take_profit;
        }
        config.quant_algo = self.quant_algo;
        Ok(config)
    }
}

#[derive(Debug, Deserialize)]
pub struct DeactivateRequest {
    pub token: String,
    #[serde(default = "default_stablecoin")]
    pub stablecoin: String,
    pub amount: serde_json::Number,
}

impl DeactivateRequest {
    fn session_key(&self) -> String {
        format!(
            "{}_{}_{}",
            self.token.trim().to_uppercase(),
            self.stablecoin.trim().to_uppercase(),
            self.amount
        )
    }
}

fn error_status(error: &AgentError) -> StatusCode {
    match error {
        AgentError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        AgentError::TokenNotFound(_) | AgentError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        AgentError::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Activates the per-session analysis scheduler. Idempotent.
///
/// # Errors
/// Returns `StatusCode::BAD_REQUEST` for malformed parameters.
pub async fn activate(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<Activation>, StatusCode> {
    let config = request.into_session_config().map_err(|e| error_status(&e))?;
    let activation = state
        .registry
        .activate(config)
        .await
        .map_err(|e| error_status(&e))?;
    Ok(Json(activation))
}

/// Deactivates a session and purges its state.
///
/// # Errors
/// Returns `StatusCode::NOT_FOUND` when no such session exists.
pub async fn deactivate(
    State(state): State<AppState>,
    Json(request): Json<DeactivateRequest>,
) -> Result<Json<Deactivation>, StatusCode> {
    let key = request.session_key();
    let deactivation = state
        .registry
        .deactivate(&key)
        .await
        .map_err(|e| error_status(&e))?;
    Ok(Json(deactivation))
}

/// The polling endpoint: cached snapshot while the session is active, a
/// one-shot analysis otherwise.
///
/// # Errors
/// Returns `StatusCode::NOT_FOUND` when the token has no upstream listing.
pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisSnapshot>, StatusCode> {
    let config = request.into_session_config().map_err(|e| error_status(&e))?;
    let snapshot = state
        .registry
        .analyze(&config)
        .await
        .map_err(|e| error_status(&e))?;
    Ok(Json(snapshot))
}

/// Status response: the live record when the registry knows the session,
/// an explicit not-activated marker otherwise.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum StatusResponse {
    Known(SessionStatus),
    Unknown {
        session_key: String,
        activated: bool,
        message: String,
    },
}

pub async fn status(
    State(state): State<AppState>,
    Path((token, stablecoin, amount)): Path<(String, String, String)>,
) -> Json<StatusResponse> {
    let key = format!(
        "{}_{}_{}",
        token.trim().to_uppercase(),
        stablecoin.trim().to_uppercase(),
        amount.trim()
    );
    match state.registry.status(&key).await {
        Some(status) => Json(StatusResponse::Known(status)),
        None => Json(StatusResponse::Unknown {
            session_key: key,
            activated: false,
            message: "Session not found or never activated".to_string(),
        }),
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoricalParams {
    #[serde(default = "default_days")]
    pub days: u32,
}

const fn default_days() -> u32 {
    30
}

#[derive(Debug, Serialize)]
pub struct HistoricalResponse {
    pub token: String,
    pub days: u32,
    pub count: usize,
    pub data: Vec<OhlcBar>,
}

/// Historical OHLC passthrough.
///
/// # Errors
/// Returns `StatusCode::NOT_FOUND` for unknown tokens.
pub async fn historical(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(params): Query<HistoricalParams>,
) -> Result<Json<HistoricalResponse>, StatusCode> {
    let data = state
        .registry
        .historical(&token, params.days)
        .await
        .map_err(|e| error_status(&e))?;
    Ok(Json(HistoricalResponse {
        token: token.trim().to_uppercase(),
        days: params.days,
        count: data.len(),
        data,
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: chrono::DateTime<Utc>,
    pub services: HealthServices,
}

#[derive(Debug, Serialize)]
pub struct HealthServices {
    pub market_data: &'static str,
    pub sentiment: &'static str,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let configured = |key: &str| if key.is_empty() { "not configured" } else { "configured" };
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        services: HealthServices {
            market_data: configured(&state.config.market_data.api_key),
            sentiment: configured(&state.config.sentiment.api_key),
        },
    })
}
