//! Quote and historical-candle client.
//!
//! Quotes come from a CoinMarketCap-compatible endpoint; historical series
//! from a CoinGecko-compatible one (quote-tier plans rarely include
//! history, so the two concerns use different upstreams).

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use governor::{clock::DefaultClock, state::InMemoryState, Quota, RateLimiter};
use perp_agent_core::{AgentError, MarketDataConfig, MarketDataProvider, OhlcBar, TokenQuote};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Synthetic high/low band applied when the history upstream only has
/// close prices.
const OHLC_BAND: f64 = 0.02;

pub struct MarketDataClient {
    http: Client,
    api_url: String,
    api_key: String,
    historical_api_url: String,
    rate_limiter: Arc<RateLimiter<governor::state::direct::NotKeyed, InMemoryState, DefaultClock>>,
}

impl MarketDataClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed or the
    /// configured rate limit is zero.
    pub fn new(config: &MarketDataConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let per_second = NonZeroU32::new(config.requests_per_second.max(1))
            .ok_or_else(|| anyhow::anyhow!("requests_per_second must be positive"))?;
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(per_second)));

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            historical_api_url: config.historical_api_url.clone(),
            rate_limiter,
        })
    }

    /// Well-known symbol → CoinGecko id mappings; anything else goes
    /// through the search endpoint.
    fn gecko_id(symbol: &str) -> Option<&'static str> {
        match symbol {
            "BTC" => Some("bitcoin"),
            "ETH" => Some("ethereum"),
            "APT" => Some("aptos"),
            "SOL" => Some("solana"),
            "BNB" => Some("binancecoin"),
            "ADA" => Some("cardano"),
            "XRP" => Some("ripple"),
            "DOGE" => Some("dogecoin"),
            "DOT" => Some("polkadot"),
            "AVAX" => Some("avalanche-2"),
            "LINK" => Some("chainlink"),
            "UNI" => Some("uniswap"),
            "ATOM" => Some("cosmos"),
            "LTC" => Some("litecoin"),
            _ => None,
        }
    }

    async fn resolve_gecko_id(&self, symbol: &str) -> Result<String, AgentError> {
        if let Some(id) = Self::gecko_id(symbol) {
            return Ok(id.to_string());
        }

        let url = format!(
            "{}/search?query={}",
            self.historical_api_url,
            symbol.to_lowercase()
        );
        debug!(url = %url, "Resolving asset id via search");
        let response: SearchResponse = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AgentError::Provider(format!("asset search failed: {e}")))?
            .json()
            .await
            .map_err(|e| AgentError::Provider(format!("asset search parse failed: {e}")))?;

        response
            .coins
            .into_iter()
            .next()
            .map(|c| c.id)
            .ok_or_else(|| AgentError::TokenNotFound(symbol.to_string()))
    }
}

#[async_trait]
impl MarketDataProvider for MarketDataClient {
    async fn quote(&self, symbol: &str) -> Result<TokenQuote, AgentError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/cryptocurrency/quotes/latest", self.api_url);
        let response = self
            .http
            .get(&url)
            .header("X-CMC_PRO_API_KEY", &self.api_key)
            .header("Accepts", "application/json")
            .query(&[("symbol", symbol), ("convert", "USD")])
            .send()
            .await
            .map_err(|e| AgentError::Provider(format!("quote request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(%symbol, %status, "Quote upstream returned an error status");
            return Err(AgentError::Provider(format!(
                "quote upstream returned {status}"
            )));
        }

        let envelope: QuoteEnvelope = response
            .json()
            .await
            .map_err(|e| AgentError::Provider(format!("quote parse failed: {e}")))?;

        if let Some(status) = &envelope.status {
            if status.error_code != 0 {
                return Err(AgentError::Provider(format!(
                    "quote upstream error {}: {}",
                    status.error_code,
                    status.error_message.as_deref().unwrap_or("unknown")
                )));
            }
        }

        let entry = envelope
            .data
            .get(symbol)
            .ok_or_else(|| AgentError::TokenNotFound(symbol.to_string()))?;
        // The upstream returns a single object or a one-element list
        // depending on the plan; accept both.
        let token = match entry {
            QuoteData::One(token) => token,
            QuoteData::Many(list) => list
                .first()
                .ok_or_else(|| AgentError::TokenNotFound(symbol.to_string()))?,
        };
        let usd = token
            .quote
            .get("USD")
            .ok_or_else(|| AgentError::TokenNotFound(symbol.to_string()))?;

        Ok(TokenQuote {
            name: token.name.clone(),
            symbol: token.symbol.clone(),
            price: usd.price,
            market_cap: usd.market_cap.unwrap_or(0.0),
            volume_24h: usd.volume_24h.unwrap_or(0.0),
            percent_change_1h: usd.percent_change_1h.unwrap_or(0.0),
            percent_change_24h: usd.percent_change_24h.unwrap_or(0.0),
            percent_change_7d: usd.percent_change_7d.unwrap_or(0.0),
            last_updated: usd.last_updated.unwrap_or_else(Utc::now),
        })
    }

    async fn historical(&self, symbol: &str, days: u32) -> Result<Vec<OhlcBar>, AgentError> {
        let id = self.resolve_gecko_id(symbol).await?;
        let interval = if days > 7 { "daily" } else { "hourly" };
        let url = format!(
            "{}/coins/{}/market_chart?vs_currency=usd&days={}&interval={}",
            self.historical_api_url, id, days, interval
        );
        debug!(url = %url, "Fetching historical series");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AgentError::Provider(format!("historical request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(AgentError::Provider(format!(
                "historical upstream returned {}",
                response.status()
            )));
        }
        let chart: MarketChart = response
            .json()
            .await
            .map_err(|e| AgentError::Provider(format!("historical parse failed: {e}")))?;

        Ok(bars_from_chart(&chart))
    }
}

/// Builds OHLC bars from a close-price series: open carries over the
/// previous close, high/low are a band around the close.
fn bars_from_chart(chart: &MarketChart) -> Vec<OhlcBar> {
    chart
        .prices
        .iter()
        .enumerate()
        .filter_map(|(i, point)| {
            let [ts_ms, close] = *point;
            let timestamp = Utc.timestamp_millis_opt(ts_ms as i64).single()?;
            let open = if i > 0 { chart.prices[i - 1][1] } else { close };
            let volume = chart
                .total_volumes
                .get(i)
                .map_or(0.0, |v| v[1]);
            Some(OhlcBar {
                timestamp,
                open,
                high: close * (1.0 + OHLC_BAND),
                low: close * (1.0 - OHLC_BAND),
                close,
                volume,
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct QuoteEnvelope {
    status: Option<QuoteStatus>,
    #[serde(default)]
    data: HashMap<String, QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteStatus {
    #[serde(default)]
    error_code: i64,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QuoteData {
    One(QuoteToken),
    Many(Vec<QuoteToken>),
}

#[derive(Debug, Deserialize)]
struct QuoteToken {
    name: String,
    symbol: String,
    quote: HashMap<String, UsdQuote>,
}

#[derive(Debug, Deserialize)]
struct UsdQuote {
    price: f64,
    market_cap: Option<f64>,
    volume_24h: Option<f64>,
    percent_change_1h: Option<f64>,
    percent_change_24h: Option<f64>,
    percent_change_7d: Option<f64>,
    last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    coins: Vec<SearchCoin>,
}

#[derive(Debug, Deserialize)]
struct SearchCoin {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MarketChart {
    #[serde(default)]
    prices: Vec<[f64; 2]>,
    #[serde(default)]
    total_volumes: Vec<[f64; 2]>,
}
