//! Stats command - open-tracking report and CSV export

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::Args;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::info;

use campaign_core::reporter::{OutputFormat, Reporter};
use campaign_core::source::DEFAULT_PAGE_SIZE;
use campaign_core::tracking::{export_csv, export_file_name};
use campaign_core::{fetch_all, TrackingReport};
use notion_source::NotionTrackingSource;

use super::output_path;

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Export raw records to CSV (default: email_tracking_export_<timestamp>.csv)
    #[arg(long, num_args = 0..=1, value_name = "PATH")]
    pub export: Option<Option<PathBuf>>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: StatsArgs) -> Result<()> {
    let source = NotionTrackingSource::from_env()
        .context("Notion analytics source is not configured")?;
    let records = fetch_all(&source, DEFAULT_PAGE_SIZE)
        .await
        .context("Failed to fetch tracking data")?;
    info!(records = records.len(), "Fetched tracking records");

    let report = TrackingReport::build(&records, Utc::now());
    if report.is_empty() && !args.json {
        println!("No tracking data found.");
    } else {
        let format = if args.json {
            OutputFormat::JsonPretty
        } else {
            OutputFormat::Console
        };
        Reporter::new(format).report(&report)?;
    }

    if let Some(path) = output_path(&args.export, || export_file_name(Local::now())) {
        let file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        export_csv(&records, BufWriter::new(file))
            .with_context(|| format!("Failed to export to {}", path.display()))?;
        info!(path = %path.display(), records = records.len(), "Tracking data exported");
    }

    Ok(())
}
