use std::env;
use tracing::info;
use tracing_subscriber::EnvFilter;
use trading_strategy_orchestrator::{config::Settings, Orchestrator};

const DEFAULT_QUERY: &str =
    "Give me a trading strategy for AAPL considering technicals, fundamentals, and risk.";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let query = if !args.is_empty() {
        args.join(" ")
    } else {
        env::var("TRADING_QUERY").unwrap_or_else(|_| DEFAULT_QUERY.to_string())
    };

    let settings = Settings::from_env()?;
    let orchestrator = Orchestrator::from_settings(&settings)?;

    info!(query = %query, "Running strategy workflow");

    match orchestrator.run_workflow(&query).await {
        Ok(strategy) => {
            println!("\n=== SECURITIES TRADING STRATEGY ===");
            println!("{}", strategy);
            println!("\n=== JSON ===");
            println!("{}", serde_json::to_string_pretty(&strategy)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("Orchestration failed: {}", e);
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}
