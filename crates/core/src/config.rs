use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub market_data: MarketDataConfig,
    pub sentiment: SentimentConfig,
    pub onchain: OnchainConfig,
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataConfig {
    pub api_url: String,
    /// Quote API key; empty means unconfigured (health reports it).
    pub api_key: String,
    pub historical_api_url: String,
    pub request_timeout_secs: u64,
    /// Upstream rate limit, requests per second.
    pub requests_per_second: u32,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            api_url: "https://pro-api.coinmarketcap.com/v1".to_string(),
            api_key: String::new(),
            historical_api_url: "https://api.coingecko.com/api/v3".to_string(),
            request_timeout_secs: 10,
            requests_per_second: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentConfig {
    pub api_url: String,
    pub api_key: String,
    pub request_timeout_secs: u64,
    pub default_model: String,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            request_timeout_secs: 60,
            default_model: "GPT-5".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnchainConfig {
    pub rpc_url: String,
    pub request_timeout_secs: u64,
}

impl Default for OnchainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://fullnode.mainnet.aptoslabs.com/v1".to_string(),
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Scheduler tick period per session, in milliseconds.
    pub tick_interval_ms: u64,
    /// Bounded length of the per-session live price history.
    pub price_history_capacity: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            price_history_capacity: 100,
        }
    }
}
