//! Send command - deliver the campaign

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Local;
use clap::Args;
use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use campaign_core::reporter::{OutputFormat, Reporter};
use campaign_core::source::DEFAULT_PAGE_SIZE;
use campaign_core::{
    fetch_all, normalize_email, CampaignController, Contact, DeliveryReceipt, DeliverySettings,
    OutboundEmail, RunOptions, SendMode, StopSignal, Transport, TransportError,
};
use campaign_mail::{transport_from_env, MaybeThrottled, Throttled, TransportKind};
use campaign_templates::{run_context, TemplateRenderer};
use notion_source::NotionContactSource;

use super::{output_path, parse_positive, summary_file_name};
use crate::settings::{self, Overrides};

/// Pause before a live run starts, so a mistaken launch can be aborted
pub const CONFIRMATION_PAUSE: Duration = Duration::from_secs(5);

/// Exit status for a run stopped by Ctrl-C
const INTERRUPTED_EXIT: u8 = 130;

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Dispatch mode: sequential (one at a time) or batched
    #[arg(long)]
    pub mode: Option<SendMode>,

    /// List what would be sent without sending or touching the ledgers
    #[arg(long)]
    pub dry_run: bool,

    /// Messages per batch in batched mode
    #[arg(long, value_parser = parse_positive)]
    pub batch_size: Option<usize>,

    /// Email provider
    #[arg(long, default_value = "resend")]
    pub transport: TransportKind,

    /// Only send to these addresses (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,

    /// Attempt at most this many pending contacts
    #[arg(long, value_parser = parse_positive)]
    pub limit: Option<usize>,

    /// Also write the summary to a file (default: campaign-summary-YYYY-MM-DD.txt)
    #[arg(long, num_args = 0..=1, value_name = "PATH")]
    pub summary_file: Option<Option<PathBuf>>,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Skip the pause before a live run
    #[arg(long, short = 'y')]
    pub yes: bool,
}

/// Stand-in for dry runs, which never reach a provider
struct DryRunTransport;

#[async_trait]
impl Transport for DryRunTransport {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    async fn send(&self, _email: &OutboundEmail) -> Result<DeliveryReceipt, TransportError> {
        Ok(DeliveryReceipt::default())
    }
}

fn build_transport(
    args: &SendArgs,
    max_per_second: Option<u32>,
) -> Result<MaybeThrottled<Box<dyn Transport>>> {
    if args.dry_run {
        let transport: Box<dyn Transport> = Box::new(DryRunTransport);
        return Ok(Throttled::maybe(transport, None));
    }
    transport_from_env(args.transport, max_per_second)
        .with_context(|| format!("Failed to set up {:?} transport", args.transport))
}

/// Keep only contacts named by `--only`; warn about names with no contact
pub fn restrict_to(contacts: Vec<Contact>, only: &[String]) -> Vec<Contact> {
    if only.is_empty() {
        return contacts;
    }
    let wanted: HashSet<String> = only.iter().map(|e| normalize_email(e)).collect();
    let selected: Vec<Contact> = contacts
        .into_iter()
        .filter(|c| wanted.contains(&c.email))
        .collect();

    let found: HashSet<&str> = selected.iter().map(|c| c.email.as_str()).collect();
    for missing in wanted.iter().filter(|e| !found.contains(e.as_str())) {
        warn!(email = %missing, "--only address is not in the contact list");
    }
    selected
}

/// Forward the first interrupt to `stop`; resolve on the second.
///
/// Also resolves with `false` if the signal source fails before a second
/// interrupt arrives.
async fn forward_interrupts<F, Fut>(mut next: F, stop: StopSignal) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if next().await.is_err() {
        return false;
    }
    warn!("Interrupt received; finishing the current item and stopping (Ctrl-C again to force quit)");
    stop.stop();
    next().await.is_ok()
}

/// Ctrl-C stops the run gracefully; a second Ctrl-C exits immediately
fn watch_ctrl_c(stop: StopSignal) {
    tokio::spawn(async move {
        if forward_interrupts(tokio::signal::ctrl_c, stop).await {
            error!("Second interrupt received; exiting without waiting for the current item");
            std::process::exit(i32::from(INTERRUPTED_EXIT));
        }
    });
}

pub async fn execute(args: SendArgs, config_path: Option<&Path>) -> Result<ExitCode> {
    let overrides = Overrides {
        mode: args.mode,
        batch_size: args.batch_size,
    };
    let config = settings::load(config_path, &overrides)?;
    let mode = config.campaign.mode;

    // Everything that can fail for lack of credentials fails before any send
    let source = NotionContactSource::from_env().context("Notion contact source is not configured")?;
    let transport = build_transport(&args, config.delivery.max_per_second)?;
    let renderer = TemplateRenderer::from_config(&config.template)
        .context("Failed to load email template")?;

    let context = run_context(&config.template, Local::now().fixed_offset()).await;
    info!(
        live_count = ?context.live_count,
        hours_remaining = ?context.hours_remaining,
        "Prepared render context"
    );

    let contacts = fetch_all(&source, DEFAULT_PAGE_SIZE)
        .await
        .context("Failed to fetch contacts")?;
    info!(contacts = contacts.len(), "Fetched contacts");
    let contacts = restrict_to(contacts, &args.only);

    let stop = StopSignal::new();
    watch_ctrl_c(stop.clone());

    if !args.dry_run && !args.yes {
        eprintln!(
            "Sending LIVE via {:?} in {} seconds ({} mode). Press Ctrl-C to abort.",
            args.transport,
            CONFIRMATION_PAUSE.as_secs(),
            mode
        );
        if stop.sleep(CONFIRMATION_PAUSE).await {
            eprintln!("Aborted before sending.");
            return Ok(ExitCode::from(INTERRUPTED_EXIT));
        }
    }

    let controller = CampaignController::new(
        DeliverySettings::from(&config),
        config.ledger_store(),
        Arc::new(renderer),
        transport,
    )
    .with_stop_signal(stop);

    let options = RunOptions::new(mode).dry_run(args.dry_run).limit(args.limit);
    let summary = controller
        .run(contacts, options, context)
        .await
        .context("Campaign run aborted")?;

    let format = if args.json {
        OutputFormat::JsonPretty
    } else {
        OutputFormat::Console
    };
    Reporter::new(format).report(&summary)?;

    if let Some(path) = output_path(&args.summary_file, || summary_file_name(Local::now())) {
        Reporter::new(OutputFormat::Console)
            .write_to_file(&summary, &path)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
        info!(path = %path.display(), "Summary written");
    }

    if summary.is_interrupted() {
        Ok(ExitCode::from(INTERRUPTED_EXIT))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
