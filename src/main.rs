use anyhow::Result;
use clap::{Parser, Subcommand};
use toolhub_core::{config::Config, migration, server, telemetry};
use tracing::info;

#[derive(Parser)]
#[command(name = "toolhub-core", version, about = "Toolhub authorization engine and admin API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create the database if needed and apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let metrics = telemetry::init(&config.telemetry)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            info!("Starting Toolhub Core");
            info!("HTTP server listening on {}", config.http_addr());
            server::run(config, metrics).await
        }
        Command::Migrate => migration::run_migrations(&config).await,
    }
}
