use chrono::Utc;
use clap::Parser;
use edgeline::adapters::{
    DisabledResolver, ExchangeClient, LlmTeamResolver, NoopNotifier, OddsApiClient, PostgresStore,
    SmsWebhookNotifier,
};
use edgeline::cli::{Cli, Commands};
use edgeline::config::AppConfig;
use edgeline::detector::DetectorService;
use edgeline::error::Result;
use edgeline::services::{serve, AppState};
use edgeline::{AlertNotifier, TeamResolver};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config).unwrap_or_else(|e| {
        eprintln!("Failed to load config from {}: {}", cli.config, e);
        std::process::exit(2);
    });

    init_logging(&config);

    let problems = config.validate();
    for problem in &problems {
        warn!("Config problem: {}", problem);
    }

    let service = Arc::new(build_service(&config).await?);

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => {
            let port = port.or(config.server_port).unwrap_or(8080);
            let state = Arc::new(AppState {
                service,
                started_at: Utc::now(),
            });
            serve(state, port).await
        }
        Commands::Pass => {
            let counters = service.run_pass().await?;
            println!("{}", serde_json::to_string_pretty(&counters)?);
            Ok(())
        }
    }
}

async fn build_service(config: &AppConfig) -> Result<DetectorService> {
    let store = Arc::new(
        PostgresStore::new(&config.database.url, config.database.max_connections).await?,
    );

    let exchange = ExchangeClient::new(config.exchange.clone())?;

    let odds = match OddsApiClient::new(config.odds.clone()) {
        Ok(client) => Some(client),
        Err(e) => {
            // The server still starts; /detect answers 5xx until the key
            // is configured
            warn!("Odds API unavailable: {}", e);
            None
        }
    };

    let resolver: Arc<dyn TeamResolver> = if config.resolver.api_key.is_empty() {
        info!("Team resolver disabled (no LLM key); matcher tiers 1-3 only");
        Arc::new(DisabledResolver)
    } else {
        Arc::new(LlmTeamResolver::new(config.resolver.clone())?)
    };

    let notifier: Arc<dyn AlertNotifier> = match SmsWebhookNotifier::new(&config.alerts) {
        Some(notifier) => Arc::new(notifier),
        None => {
            info!("SMS alerts disabled");
            Arc::new(NoopNotifier)
        }
    };

    Ok(DetectorService::new(
        store,
        exchange,
        odds,
        resolver,
        notifier,
        config.clone(),
    ))
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
