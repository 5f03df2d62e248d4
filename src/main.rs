//! StockMaster CLI - run the gateway or manage accounts offline.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stockmaster::auth::{CredentialStore, SqliteAccountRepository, TokenService};
use stockmaster::Config;
use tracing_subscriber::EnvFilter;

/// StockMaster - inventory tracking backend
#[derive(Parser)]
#[command(name = "stockmaster", version, about)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP gateway
    Serve {
        /// Override gateway.host
        #[arg(long)]
        host: Option<String>,

        /// Override gateway.port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Create an account directly in the database
    Register {
        #[arg(long)]
        username: String,

        #[arg(long)]
        password: String,
    },

    /// Validate a bearer token and print its claims
    VerifyToken {
        /// Token without the `Bearer ` prefix
        token: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stockmaster=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            stockmaster::gateway::run_gateway(config).await
        }
        Commands::Register { username, password } => {
            let db_path = config.storage.resolved_db_path()?;
            let repo = SqliteAccountRepository::open(&db_path)?;
            let store = CredentialStore::new(
                Arc::new(repo),
                config.auth.bcrypt_cost,
                config.auth.min_password_len,
            )?;
            let account = store
                .register(&username, &password)
                .context("registration failed")?;
            println!("Registered {} ({})", account.username, account.id);
            Ok(())
        }
        Commands::VerifyToken { token } => {
            let tokens = TokenService::new(config.auth.token_config())?;
            let claims = tokens.validate(token.trim())?;
            println!("{}", serde_json::to_string_pretty(&claims)?);
            Ok(())
        }
    }
}
