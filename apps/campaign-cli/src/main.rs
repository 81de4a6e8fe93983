//! `campaign` binary entry point

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;

use campaign_cli::{commands, logging, Cli, Commands};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // A missing .env is fine; credentials may already be in the environment
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    logging::init(cli.log_json);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting campaign");

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Send(args) => commands::send::execute(args, config).await,
        Commands::Preview(args) => commands::preview::execute(args, config)
            .await
            .map(|()| ExitCode::SUCCESS),
        Commands::Stats(args) => commands::stats::execute(args)
            .await
            .map(|()| ExitCode::SUCCESS),
    }
}
