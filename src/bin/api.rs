use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use trading_strategy_orchestrator::{api::start_server, config::Settings, Orchestrator};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env()?;

    info!("Trading Strategy Orchestrator - API Server");
    info!("Port: {}", settings.port);
    info!("Model: {}", settings.gemini_model);

    let orchestrator = Arc::new(Orchestrator::from_settings(&settings)?);

    info!("Orchestrator initialized, starting API server");

    start_server(orchestrator, settings.port).await?;

    Ok(())
}
