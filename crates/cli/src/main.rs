use anyhow::Context;
use clap::{Parser, Subcommand};
use perp_agent_core::{AppConfig, ConfigLoader, RiskLevel};
use perp_agent_orchestrator::{ProviderSet, SessionConfig, SessionRegistry};
use perp_agent_providers::{MarketDataClient, OnchainClient, SentimentClient};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "perp-agent")]
#[command(about = "Perp DEX signal and position analysis agent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the web API server
    Server {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
        /// Address override, e.g. "0.0.0.0:8000"
        #[arg(short, long)]
        addr: Option<String>,
    },
    /// Run one analysis cycle for a token and print the snapshot
    Analyze {
        /// Token to analyze (e.g. APT, BTC)
        #[arg(long)]
        token: String,
        /// Collateral stablecoin
        #[arg(long, default_value = "USDC")]
        stablecoin: String,
        /// Collateral amount
        #[arg(long, default_value = "100")]
        amount: String,
        /// Risk appetite: conservative, moderate, or aggressive
        #[arg(long, default_value = "moderate")]
        risk_level: String,
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server { config, addr } => {
            let app_config = ConfigLoader::load_from(&config).context("Failed to load config")?;
            let addr = addr.unwrap_or_else(|| {
                format!("{}:{}", app_config.server.host, app_config.server.port)
            });

            let registry = Arc::new(build_registry(&app_config)?);
            let server =
                perp_agent_web_api::ApiServer::new(registry.clone(), Arc::new(app_config));

            tokio::select! {
                result = server.serve(&addr) => result?,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutting down, stopping all sessions");
                    registry.shutdown_all().await;
                }
            }
            Ok(())
        }
        Commands::Analyze {
            token,
            stablecoin,
            amount,
            risk_level,
            config,
        } => {
            let app_config = ConfigLoader::load_from(&config).context("Failed to load config")?;
            let registry = build_registry(&app_config)?;

            let mut session = SessionConfig::try_new(&token, &stablecoin, &amount)?;
            session.risk_level = risk_level.parse::<RiskLevel>()?;
            session.model = app_config.sentiment.default_model.clone();

            let snapshot = registry.analyze(&session).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
    }
}

fn build_registry(config: &AppConfig) -> anyhow::Result<SessionRegistry> {
    let providers = ProviderSet {
        market: Arc::new(
            MarketDataClient::new(&config.market_data)
                .context("Failed to build market data client")?,
        ),
        sentiment: Arc::new(
            SentimentClient::new(&config.sentiment).context("Failed to build sentiment client")?,
        ),
        onchain: Arc::new(
            OnchainClient::new(&config.onchain).context("Failed to build on-chain client")?,
        ),
    };
    Ok(SessionRegistry::new(providers, config.agent.clone()))
}
