use anyhow::Result;
use dotenv::dotenv;
use std::sync::Arc;

use fitai_gateway::config::Config;
use fitai_gateway::handlers::CoachHandler;
use fitai_gateway::server;
use fitai_gateway::services::{Gateway, GeminiClient, SessionState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    log::info!("🚀 Starting FitAI coaching gateway...");

    // A missing API key stops startup here
    let config = Config::from_env()?;

    let provider = Arc::new(GeminiClient::new(config.api_key.clone(), config.base_url.clone()));
    log::info!("✅ Gemini client initialized ({})", config.base_url);

    let gateway = Arc::new(Gateway::new(provider));
    let session = Arc::new(SessionState::new());
    let coach = Arc::new(CoachHandler::new(gateway, session));
    log::info!("✅ Coach handler initialized");

    let app = server::create_router(coach);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    log::info!("🌐 HTTP API listening on {}", config.bind_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            log::error!("❌ HTTP server stopped: {}", e);
        }
    });

    log::info!("🎉 Gateway is ready!");

    // Keep running
    tokio::signal::ctrl_c().await?;

    log::info!("🛑 Shutting down...");

    Ok(())
}
