//! End-to-end session lifecycle tests against in-process mock providers.

use async_trait::async_trait;
use chrono::Utc;
use perp_agent_core::{
    AgentConfig, AgentError, MarketDataProvider, OhlcBar, OnchainProvider, OnchainSummary,
    SentimentProvider, SentimentRisk, SentimentSummary, SessionPhase, TokenQuote,
};
use perp_agent_orchestrator::{Activation, ProviderSet, SessionConfig, SessionRegistry};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Market stub that pops scripted prices and then repeats the last one.
struct ScriptedMarket {
    prices: Mutex<VecDeque<f64>>,
}

impl ScriptedMarket {
    fn new(prices: &[f64]) -> Self {
        Self {
            prices: Mutex::new(prices.iter().copied().collect()),
        }
    }
}

#[async_trait]
impl MarketDataProvider for ScriptedMarket {
    async fn quote(&self, symbol: &str) -> Result<TokenQuote, AgentError> {
        let mut prices = self.prices.lock().unwrap();
        let price = if prices.len() > 1 {
            prices.pop_front().unwrap()
        } else {
            *prices.front().expect("script must not be empty")
        };
        Ok(TokenQuote {
            name: "Test Token".to_string(),
            symbol: symbol.to_string(),
            price,
            market_cap: 1_000_000.0,
            volume_24h: 500_000.0,
            percent_change_1h: 0.0,
            percent_change_24h: 0.0,
            percent_change_7d: 0.0,
            last_updated: Utc::now(),
        })
    }

    async fn historical(&self, _symbol: &str, _days: u32) -> Result<Vec<OhlcBar>, AgentError> {
        Ok(Vec::new())
    }
}

/// Market stub that always fails, for the NotFound path.
struct UnknownTokenMarket;

#[async_trait]
impl MarketDataProvider for UnknownTokenMarket {
    async fn quote(&self, symbol: &str) -> Result<TokenQuote, AgentError> {
        Err(AgentError::TokenNotFound(symbol.to_string()))
    }

    async fn historical(&self, symbol: &str, _days: u32) -> Result<Vec<OhlcBar>, AgentError> {
        Err(AgentError::TokenNotFound(symbol.to_string()))
    }
}

/// Sentiment stub with an adjustable score (applied to both the overall
/// and short-term readings, at Low risk).
struct FixedSentiment {
    score: Arc<Mutex<f64>>,
}

#[async_trait]
impl SentimentProvider for FixedSentiment {
    async fn analyze(
        &self,
        _symbol: &str,
        _name: &str,
        _quote: &TokenQuote,
        _model: &str,
    ) -> SentimentSummary {
        let score = *self.score.lock().unwrap();
        SentimentSummary {
            overall_sentiment: score,
            short_term_sentiment: score,
            medium_term_sentiment: score,
            risk_level: SentimentRisk::Low,
            key_factors: vec!["scripted".to_string()],
            reasoning: "scripted".to_string(),
        }
    }
}

struct NeutralOnchain;

#[async_trait]
impl OnchainProvider for NeutralOnchain {
    async fn analyze(&self, _symbol: &str) -> OnchainSummary {
        OnchainSummary::neutral()
    }
}

fn fast_agent_config() -> AgentConfig {
    AgentConfig {
        tick_interval_ms: 10,
        ..AgentConfig::default()
    }
}

/// Strong-bull providers: sentiment 80/80 at Low risk fuses to a score of
/// 33.6 and confidence 67.2%, clearing both entry floors with 5x leverage
/// at moderate session risk.
fn bullish_providers(prices: &[f64]) -> (ProviderSet, Arc<Mutex<f64>>) {
    let score = Arc::new(Mutex::new(80.0));
    let providers = ProviderSet {
        market: Arc::new(ScriptedMarket::new(prices)),
        sentiment: Arc::new(FixedSentiment {
            score: score.clone(),
        }),
        onchain: Arc::new(NeutralOnchain),
    };
    (providers, score)
}

/// Neutral providers: zero sentiment keeps every decision at HOLD.
fn neutral_providers(prices: &[f64]) -> ProviderSet {
    ProviderSet {
        market: Arc::new(ScriptedMarket::new(prices)),
        sentiment: Arc::new(FixedSentiment {
            score: Arc::new(Mutex::new(0.0)),
        }),
        onchain: Arc::new(NeutralOnchain),
    }
}

const WAIT_TIMEOUT: Duration = Duration::from_secs(3);
const WAIT_POLL: Duration = Duration::from_millis(5);

#[tokio::test]
async fn activation_is_idempotent() {
    let registry = SessionRegistry::new(neutral_providers(&[100.0]), fast_agent_config());
    let config = SessionConfig::try_new("APT", "USDC", "100").unwrap();
    let key = config.session_key();

    let first = registry.activate(config.clone()).await.unwrap();
    let first_at = match &first {
        Activation::Activated { activated_at, .. } => *activated_at,
        other => panic!("expected Activated, got {other:?}"),
    };

    tokio::time::sleep(Duration::from_millis(30)).await;

    let second = registry.activate(config).await.unwrap();
    match second {
        Activation::AlreadyActivated {
            activated_at,
            session_key,
        } => {
            assert_eq!(session_key, key);
            assert_eq!(activated_at, first_at);
        }
        other => panic!("expected AlreadyActivated, got {other:?}"),
    }

    let status = registry.status(&key).await.unwrap();
    assert!(status.activated);
    assert_eq!(status.activated_at, first_at);

    registry.deactivate(&key).await.unwrap();
}

#[tokio::test]
async fn analyze_serves_placeholder_then_live_snapshots() {
    // One immediate tick, then a long idle period: the placeholder can
    // only be observed before that first tick lands.
    let agent_config = AgentConfig {
        tick_interval_ms: 30_000,
        ..AgentConfig::default()
    };
    let registry = SessionRegistry::new(neutral_providers(&[100.0]), agent_config);
    let config = SessionConfig::try_new("APT", "USDC", "100").unwrap();

    registry.activate(config.clone()).await.unwrap();

    let early = registry.analyze(&config).await.unwrap();
    if early.agent_status == SessionPhase::Initializing {
        assert_eq!(early.iteration, 0);
        assert!((early.market.price - 0.0).abs() < f64::EPSILON);
        assert!((early.signal_score - 0.0).abs() < f64::EPSILON);
    }

    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    let live = loop {
        let snap = registry.analyze(&config).await.unwrap();
        if snap.agent_status == SessionPhase::Active {
            break snap;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "first scheduler tick never published"
        );
        tokio::time::sleep(WAIT_POLL).await;
    };

    assert!(live.iteration >= 1);
    assert!(live.poll_id.is_some());
    assert!(live.poll_timestamp.is_some());
    assert!((live.market.reference_price - 100.0).abs() < f64::EPSILON);
    // The simulated display price stays inside the 1% band.
    assert!((live.market.price - 100.0).abs() <= 1.0 + 1e-9);

    // Two polls of the same cached snapshot differ only in poll identity.
    let again = registry.analyze(&config).await.unwrap();
    assert_ne!(live.poll_id, again.poll_id);
    assert_eq!(live.update_id, again.update_id);

    registry.deactivate(&config.session_key()).await.unwrap();
}

#[tokio::test]
async fn take_profit_trips_the_circuit_breaker() {
    // Entry at 100 with 5x leverage; the jump to 115 is +75% ROI, past the
    // +50% take-profit.
    let (providers, _) = bullish_providers(&[100.0, 115.0]);
    let registry = SessionRegistry::new(providers, fast_agent_config());
    let config = SessionConfig::try_new("APT", "USDC", "100").unwrap();
    let key = config.session_key();

    registry.activate(config.clone()).await.unwrap();

    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    let status = loop {
        let status = registry.status(&key).await.unwrap();
        if !status.activated {
            break status;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "session never auto-deactivated"
        );
        tokio::time::sleep(WAIT_POLL).await;
    };

    let reason = status.deactivation_reason.expect("reason must be recorded");
    assert!(reason.contains("take_profit"), "reason was '{reason}'");
    assert!(status.deactivated_at.is_some());

    let position = status.position.expect("last position must stay visible");
    assert!(!position.is_open());
    assert!(position.pnl_pct > 50.0);

    // Auto-deactivation is soft: the record survives until an explicit
    // deactivate, but reads fall back to the one-shot path.
    let snap = registry.analyze(&config).await.unwrap();
    assert_eq!(snap.agent_status, SessionPhase::Inactive);
    assert_eq!(snap.iteration, 0);

    registry.deactivate(&key).await.unwrap();
    assert!(registry.status(&key).await.is_none());
}

#[tokio::test]
async fn stop_loss_trips_the_circuit_breaker() {
    // Entry at 100 with 5x leverage; the drop to 97 is -15% ROI, past the
    // -10% stop-loss.
    let (providers, _) = bullish_providers(&[100.0, 97.0]);
    let registry = SessionRegistry::new(providers, fast_agent_config());
    let config = SessionConfig::try_new("APT", "USDC", "100").unwrap();
    let key = config.session_key();

    registry.activate(config.clone()).await.unwrap();

    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    let status = loop {
        let status = registry.status(&key).await.unwrap();
        if !status.activated {
            break status;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "session never auto-deactivated"
        );
        tokio::time::sleep(WAIT_POLL).await;
    };

    let reason = status.deactivation_reason.unwrap();
    assert!(reason.contains("stop_loss"), "reason was '{reason}'");

    registry.deactivate(&key).await.unwrap();
}

#[tokio::test]
async fn signal_reversal_closes_without_deactivating() {
    let (providers, score) = bullish_providers(&[100.0]);
    let registry = SessionRegistry::new(providers, fast_agent_config());
    let config = SessionConfig::try_new("APT", "USDC", "100").unwrap();
    let key = config.session_key();

    registry.activate(config.clone()).await.unwrap();

    // Wait for the LONG to open.
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    loop {
        let status = registry.status(&key).await.unwrap();
        if status.has_position {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "position never opened");
        tokio::time::sleep(WAIT_POLL).await;
    }

    let opened_at = registry
        .status(&key)
        .await
        .unwrap()
        .position
        .unwrap()
        .opened_at;

    // The open position must stay the same instance across ticks.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let still_open = registry.status(&key).await.unwrap().position.unwrap();
    assert!(still_open.is_open());
    assert_eq!(still_open.opened_at, opened_at, "position was reopened");

    // Flip to a moderate bearish signal: -50/-50 at Low risk fuses to -21,
    // a SHORT with 42% confidence. Enough to reverse out of the LONG, not
    // enough to open a new SHORT.
    *score.lock().unwrap() = -50.0;

    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    loop {
        let status = registry.status(&key).await.unwrap();
        if !status.has_position {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "position never closed");
        tokio::time::sleep(WAIT_POLL).await;
    }

    let status = registry.status(&key).await.unwrap();
    assert!(status.activated, "reversal close must not deactivate");
    assert!(status.deactivation_reason.is_none());
    let closed = status.position.expect("closed position must stay visible");
    assert!(!closed.is_open());
    let reason = closed.close_reason.unwrap();
    assert!(reason.contains("signal_reversal_to_short"), "reason was '{reason}'");

    registry.deactivate(&key).await.unwrap();
}

#[tokio::test]
async fn deactivate_purges_and_later_reads_are_one_shot() {
    let registry = SessionRegistry::new(neutral_providers(&[100.0]), fast_agent_config());
    let config = SessionConfig::try_new("APT", "USDC", "100").unwrap();
    let key = config.session_key();

    registry.activate(config.clone()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    registry.deactivate(&key).await.unwrap();
    assert!(registry.status(&key).await.is_none());
    assert!(registry.session_keys().await.is_empty());

    // A second deactivate has nothing to remove.
    let err = registry.deactivate(&key).await.unwrap_err();
    assert!(matches!(err, AgentError::SessionNotFound(_)));

    // The next read computes fresh instead of serving anything stale.
    let snap = registry.analyze(&config).await.unwrap();
    assert_eq!(snap.agent_status, SessionPhase::Inactive);
    assert_eq!(snap.iteration, 0);
    assert!(snap.poll_id.is_none());
}

#[tokio::test]
async fn one_shot_analysis_surfaces_unknown_tokens() {
    let providers = ProviderSet {
        market: Arc::new(UnknownTokenMarket),
        sentiment: Arc::new(FixedSentiment {
            score: Arc::new(Mutex::new(0.0)),
        }),
        onchain: Arc::new(NeutralOnchain),
    };
    let registry = SessionRegistry::new(providers, fast_agent_config());
    let config = SessionConfig::try_new("NOPE", "USDC", "100").unwrap();

    let err = registry.analyze(&config).await.unwrap_err();
    assert!(matches!(err, AgentError::TokenNotFound(_)));
}

#[tokio::test]
async fn failed_ticks_keep_the_previous_snapshot() {
    // Script one good quote, then a poisoned upstream: the published
    // snapshot must survive the failures and the loop must keep running.
    struct FlakyMarket {
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl MarketDataProvider for FlakyMarket {
        async fn quote(&self, symbol: &str) -> Result<TokenQuote, AgentError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls == 1 {
                Ok(TokenQuote {
                    name: "Test Token".to_string(),
                    symbol: symbol.to_string(),
                    price: 100.0,
                    market_cap: 0.0,
                    volume_24h: 0.0,
                    percent_change_1h: 0.0,
                    percent_change_24h: 0.0,
                    percent_change_7d: 0.0,
                    last_updated: Utc::now(),
                })
            } else {
                Err(AgentError::Provider("scripted outage".to_string()))
            }
        }

        async fn historical(&self, _symbol: &str, _days: u32) -> Result<Vec<OhlcBar>, AgentError> {
            Ok(Vec::new())
        }
    }

    let providers = ProviderSet {
        market: Arc::new(FlakyMarket {
            calls: Mutex::new(0),
        }),
        sentiment: Arc::new(FixedSentiment {
            score: Arc::new(Mutex::new(0.0)),
        }),
        onchain: Arc::new(NeutralOnchain),
    };
    let registry = SessionRegistry::new(providers, fast_agent_config());
    let config = SessionConfig::try_new("APT", "USDC", "100").unwrap();
    let key = config.session_key();

    registry.activate(config.clone()).await.unwrap();

    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    loop {
        let snap = registry.analyze(&config).await.unwrap();
        if snap.agent_status == SessionPhase::Active {
            assert_eq!(snap.iteration, 1);
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "first tick never landed");
        tokio::time::sleep(WAIT_POLL).await;
    }

    // Several failed ticks later the good snapshot is still being served
    // and the session is still alive.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let snap = registry.analyze(&config).await.unwrap();
    assert_eq!(snap.iteration, 1);
    assert!((snap.market.reference_price - 100.0).abs() < f64::EPSILON);
    assert!(registry.status(&key).await.unwrap().activated);

    registry.deactivate(&key).await.unwrap();
}

#[tokio::test]
async fn amount_formatting_creates_distinct_sessions() {
    let registry = SessionRegistry::new(neutral_providers(&[100.0]), fast_agent_config());
    let plain = SessionConfig::try_new("APT", "USDC", "100").unwrap();
    let decimal = SessionConfig::try_new("APT", "USDC", "100.0").unwrap();

    registry.activate(plain.clone()).await.unwrap();
    registry.activate(decimal.clone()).await.unwrap();

    let mut keys = registry.session_keys().await;
    keys.sort();
    assert_eq!(
        keys,
        vec!["APT_USDC_100".to_string(), "APT_USDC_100.0".to_string()]
    );

    registry.deactivate(&plain.session_key()).await.unwrap();
    // The sibling session is untouched by the purge.
    assert!(registry.status(&decimal.session_key()).await.is_some());
    registry.deactivate(&decimal.session_key()).await.unwrap();
}
