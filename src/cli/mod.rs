pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "uplora")]
#[command(about = "Uplora CLI - run and operate the Uplora API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP API")]
    Serve {
        #[arg(long, help = "Use the in-memory store and object storage")]
        memory: bool,
        #[arg(long, help = "Port to listen on (overrides UPLORA_API_PORT)")]
        port: Option<u16>,
    },

    #[command(about = "Database maintenance")]
    Db {
        #[command(subcommand)]
        cmd: commands::db::DbCommands,
    },

    #[command(about = "Issue development bearer tokens")]
    Token {
        #[command(subcommand)]
        cmd: commands::token::TokenCommands,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Serve { memory, port } => commands::serve::handle(memory, port).await,
        Commands::Db { cmd } => commands::db::handle(cmd, output_format).await,
        Commands::Token { cmd } => commands::token::handle(cmd, output_format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_token_issue() {
        let user = uuid::Uuid::new_v4();
        let cli = Cli::try_parse_from([
            "uplora",
            "--json",
            "token",
            "issue",
            "--user",
            &user.to_string(),
            "--email",
            "a@example.com",
        ])
        .unwrap();
        assert!(matches!(OutputFormat::from_cli(&cli), OutputFormat::Json));
        match cli.command {
            Commands::Token {
                cmd: commands::token::TokenCommands::Issue { user: parsed, hours, .. },
            } => {
                assert_eq!(parsed, user);
                assert_eq!(hours, None);
            }
            _ => panic!("expected token issue"),
        }
    }

    #[test]
    fn parses_serve_flags() {
        let cli = Cli::try_parse_from(["uplora", "serve", "--memory", "--port", "4000"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Serve {
                memory: true,
                port: Some(4000)
            }
        ));
    }
}
