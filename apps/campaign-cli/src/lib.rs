//! # campaign-cli
//!
//! Command-line runner for the email campaign.
//!
//! ## Commands
//!
//! - `campaign send` - deliver the campaign to every contact not yet in the ledger
//! - `campaign preview` - render one contact's email to a file
//! - `campaign stats` - open-tracking statistics, optionally exported to CSV
//!
//! ## Environment
//!
//! Credentials are only read from the environment (or a `.env` file):
//!
//! - `NOTION_TOKEN`, `NOTION_DATABASE_ID`, `NOTION_EMAIL_ANALYTICS_DB_ID`
//! - `RESEND_API_KEY`, or `SMTP_HOST` / `SMTP_USERNAME` / `SMTP_PASSWORD`

pub mod commands;
pub mod logging;
pub mod settings;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Resumable email campaign runner
#[derive(Debug, Parser)]
#[command(name = "campaign")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// TOML configuration file (defaults to ./campaign.toml when present)
    #[arg(long, global = true, env = "CAMPAIGN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Send the campaign to pending contacts
    Send(commands::send::SendArgs),
    /// Render the email for one contact into a file
    Preview(commands::preview::PreviewArgs),
    /// Show open-tracking statistics
    Stats(commands::stats::StatsArgs),
}
