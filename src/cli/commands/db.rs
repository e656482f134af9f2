use clap::Subcommand;
use serde_json::json;

use crate::cli::{utils, OutputFormat};
use crate::config;
use crate::database::DatabaseManager;

#[derive(Subcommand)]
pub enum DbCommands {
    #[command(about = "Apply pending migrations")]
    Migrate,

    #[command(about = "Check database connectivity")]
    Ping,
}

pub async fn handle(cmd: DbCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config::config();
    if config.database.url.is_none() {
        utils::output_error(output_format, "DATABASE_URL is not set", Some("NO_DATABASE"))?;
        anyhow::bail!("DATABASE_URL is not set");
    }
    let pool = DatabaseManager::connect_lazy(&config.database)?;

    match cmd {
        DbCommands::Migrate => {
            DatabaseManager::migrate(&pool).await?;
            utils::output_success(output_format, "Migrations applied", None)
        }
        DbCommands::Ping => {
            DatabaseManager::health_check(&pool).await?;
            utils::output_success(output_format, "Database reachable", Some(json!({ "database": "ok" })))
        }
    }
}
