use tracing_subscriber::EnvFilter;

use uplora_api::app::{self, AppState};
use uplora_api::config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, STRIPE_SECRET_KEY, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::config().clone();
    config.validate().map_err(anyhow::Error::msg)?;
    tracing::info!("Starting Uplora API in {:?} mode", config.environment);
    if uplora_api::is_production!() && config.database.in_memory {
        tracing::warn!("In-memory mode enabled in production");
    }

    let state = AppState::from_config(config).await?;
    app::serve(state).await
}
