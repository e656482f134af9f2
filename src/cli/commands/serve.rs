use crate::app::{self, AppState};
use crate::config;

pub async fn handle(memory: bool, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = config::config().clone();
    if memory {
        config.database.in_memory = true;
        config.storage.in_memory = true;
    }
    if let Some(port) = port {
        config.api.port = port;
    }
    config.validate().map_err(anyhow::Error::msg)?;

    let state = AppState::from_config(config).await?;
    app::serve(state).await
}
