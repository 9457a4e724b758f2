use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest market quote for a token, in USD.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenQuote {
    pub name: String,
    pub symbol: String,
    pub price: f64,
    pub market_cap: f64,
    pub volume_24h: f64,
    pub percent_change_1h: f64,
    pub percent_change_24h: f64,
    pub percent_change_7d: f64,
    pub last_updated: DateTime<Utc>,
}

/// One candle of historical price data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OhlcBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}
