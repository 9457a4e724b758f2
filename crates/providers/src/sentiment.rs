//! LLM-backed sentiment scoring.
//!
//! Calls an OpenAI-compatible chat-completions endpoint and asks for a
//! strict JSON verdict. The provider contract is infallible: any failure
//! (transport, auth, malformed JSON) degrades to a neutral summary so the
//! fusion engine always has a sentiment input.

use anyhow::Result;
use async_trait::async_trait;
use perp_agent_core::{
    SentimentConfig, SentimentProvider, SentimentRisk, SentimentSummary, TokenQuote,
};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

pub struct SentimentClient {
    http: Client,
    api_url: String,
    api_key: String,
}

impl SentimentClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &SentimentConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Maps the user-facing model selector onto an API model id. Unknown
    /// selectors fall back to the default id rather than failing the call.
    #[must_use]
    pub fn resolve_model(selector: &str) -> &'static str {
        match selector {
            "GPT-5" | "ChatGPT / GPT-5" | "DeepSeek Chat V3.1" | "Qwen3 Max"
            | "Claude Sonnet 4.5" | "Grok 4" | "Gemini 2.5 Pro" => "gpt-4o",
            _ => "gpt-4o",
        }
    }

    fn prompt(symbol: &str, name: &str, quote: &TokenQuote) -> String {
        format!(
            "Analyze the sentiment for {name} ({symbol}) based on the following market data:\n\
             Current Price: ${:.2}\n\
             1h Change: {:.2}%\n\
             24h Change: {:.2}%\n\
             7d Change: {:.2}%\n\
             Market Cap: ${:.0}\n\
             24h Volume: ${:.0}\n\n\
             Provide: overall sentiment (-100 to +100), short-term sentiment (1-4h), \
             medium-term sentiment (24h), key factors, and a risk assessment (Low/Medium/High).\n\
             Respond with JSON only:\n\
             {{\"overall_sentiment\": <number>, \"short_term_sentiment\": <number>, \
             \"medium_term_sentiment\": <number>, \"key_factors\": [\"...\"], \
             \"risk_level\": \"Low|Medium|High\", \"reasoning\": \"...\"}}",
            quote.price,
            quote.percent_change_1h,
            quote.percent_change_24h,
            quote.percent_change_7d,
            quote.market_cap,
            quote.volume_24h,
        )
    }

    async fn request_verdict(
        &self,
        symbol: &str,
        name: &str,
        quote: &TokenQuote,
        model: &str,
    ) -> Result<SentimentSummary> {
        let body = json!({
            "model": Self::resolve_model(model),
            "messages": [
                {
                    "role": "system",
                    "content": "You are a professional cryptocurrency market analyst \
                                specializing in sentiment analysis for perpetual DEX trading. \
                                Always respond in valid JSON format only, no additional text."
                },
                {"role": "user", "content": Self::prompt(symbol, name, quote)}
            ],
            "temperature": 0.7,
            "response_format": {"type": "json_object"}
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            anyhow::bail!("sentiment upstream returned {}", response.status());
        }

        let completion: ChatCompletion = response.json().await?;
        let content = completion
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| anyhow::anyhow!("empty completion"))?;

        let verdict: SentimentVerdict = serde_json::from_str(strip_code_fences(content))?;
        debug!(
            %symbol,
            overall = verdict.overall_sentiment,
            risk = %verdict.risk_level,
            "Sentiment verdict received"
        );

        Ok(SentimentSummary {
            overall_sentiment: verdict.overall_sentiment,
            short_term_sentiment: verdict.short_term_sentiment,
            medium_term_sentiment: verdict.medium_term_sentiment,
            risk_level: verdict.risk_level.parse().unwrap_or(SentimentRisk::Medium),
            key_factors: verdict.key_factors,
            reasoning: verdict.reasoning,
        })
    }
}

#[async_trait]
impl SentimentProvider for SentimentClient {
    async fn analyze(
        &self,
        symbol: &str,
        name: &str,
        quote: &TokenQuote,
        model: &str,
    ) -> SentimentSummary {
        match self.request_verdict(symbol, name, quote, model).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(%symbol, error = %e, "Sentiment analysis failed, using neutral fallback");
                SentimentSummary::neutral(format!("sentiment unavailable: {e}"))
            }
        }
    }
}

/// Strips a surrounding ```json ... ``` fence, which some models emit even
/// when asked for bare JSON.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct SentimentVerdict {
    #[serde(default)]
    overall_sentiment: f64,
    #[serde(default)]
    short_term_sentiment: f64,
    #[serde(default)]
    medium_term_sentiment: f64,
    #[serde(default)]
    key_factors: Vec<String>,
    #[serde(default)]
    risk_level: String,
    #[serde(default)]
    reasoning: String,
}
