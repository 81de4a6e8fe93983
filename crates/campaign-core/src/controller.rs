//! Campaign controller
//!
//! Drives one run through its phases:
//!
//! ```text
//! Fetching → Filtering ─┬─> Idle ──────────────────────┬─> Summarizing
//!                       └─> Sending (sequential|batch) ┘
//! ```
//!
//! Contacts already present in the sent ledger are skipped, so re-running
//! after an interruption resumes where the previous run stopped. Every
//! successful delivery is persisted to the sent ledger before the next unit
//! of work starts (after each message in sequential mode, after each batch
//! in batched mode).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};

use crate::batch::{batch_count, partition, render_all, render_one};
use crate::config::{CampaignConfig, SendMode};
use crate::contact::{normalize_email, Contact};
use crate::error::Result;
use crate::ledger::{FailedEntry, LedgerStore};
use crate::render::{RenderContext, RenderError, Renderer};
use crate::signal::StopSignal;
use crate::source::{fetch_all, ContactSource, DEFAULT_PAGE_SIZE};
use crate::summary::{RunOutcome, RunSummary};
use crate::transport::{DeliveryStatus, OutboundEmail, Transport};

/// Per-run switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub mode: SendMode,
    pub dry_run: bool,
    /// Attempt at most this many pending contacts
    pub limit: Option<usize>,
}

impl RunOptions {
    pub fn new(mode: SendMode) -> Self {
        Self {
            mode,
            dry_run: false,
            limit: None,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }
}

/// Pacing and message settings taken from the configuration
#[derive(Debug, Clone)]
pub struct DeliverySettings {
    pub from: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub batch_size: usize,
    pub send_delay: Duration,
    pub batch_delay: Duration,
    pub render_workers: usize,
}

impl From<&CampaignConfig> for DeliverySettings {
    fn from(config: &CampaignConfig) -> Self {
        Self {
            from: config.campaign.from.clone(),
            reply_to: config.campaign.reply_to.clone(),
            subject: config.campaign.subject.clone(),
            batch_size: config.delivery.batch_size.max(1),
            send_delay: config.delivery.send_delay(),
            batch_delay: config.delivery.batch_delay(),
            render_workers: config.delivery.render_workers.max(1),
        }
    }
}

/// Phase of a run, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Fetching,
    Filtering,
    Idle,
    SequentialLoop,
    BatchLoop,
    Summarizing,
}

/// Transient counters for the run in progress
#[derive(Debug)]
struct RunState {
    phase: RunPhase,
    total: usize,
    skipped: usize,
    pending: usize,
    sent: usize,
    failed: usize,
    batches: usize,
    interrupted: bool,
    started_at: DateTime<Utc>,
    clock: Instant,
}

impl RunState {
    fn new(total: usize) -> Self {
        Self {
            phase: RunPhase::Filtering,
            total,
            skipped: 0,
            pending: 0,
            sent: 0,
            failed: 0,
            batches: 0,
            interrupted: false,
            started_at: Utc::now(),
            clock: Instant::now(),
        }
    }

    fn enter(&mut self, phase: RunPhase) {
        debug!(from = ?self.phase, to = ?phase, "Run phase change");
        self.phase = phase;
    }

    fn finish(mut self, options: &RunOptions) -> RunSummary {
        self.enter(RunPhase::Summarizing);
        let outcome = if self.interrupted {
            RunOutcome::Interrupted
        } else if self.pending == 0 {
            RunOutcome::NothingToSend
        } else {
            RunOutcome::Completed
        };

        RunSummary {
            mode: options.mode,
            dry_run: options.dry_run,
            total: self.total,
            sent: self.sent,
            failed: self.failed,
            skipped: self.skipped,
            not_attempted: self.pending.saturating_sub(self.sent + self.failed),
            batches: self.batches,
            outcome,
            started_at: self.started_at,
            duration: self.clock.elapsed(),
        }
    }
}

/// Drop contacts already delivered and repeated addresses.
///
/// Returns the pending contacts in input order and the number skipped.
pub fn filter_pending(contacts: Vec<Contact>, sent: &HashSet<String>) -> (Vec<Contact>, usize) {
    let total = contacts.len();
    let mut seen = HashSet::with_capacity(total);
    let pending: Vec<Contact> = contacts
        .into_iter()
        .filter(|c| {
            let key = normalize_email(&c.email);
            !sent.contains(&key) && seen.insert(key)
        })
        .collect();
    let skipped = total - pending.len();
    (pending, skipped)
}

fn render_failure(err: &RenderError) -> String {
    format!("render failed: {err}")
}

pub struct CampaignController<R, T> {
    renderer: Arc<R>,
    transport: T,
    ledger: LedgerStore,
    settings: DeliverySettings,
    stop: StopSignal,
}

impl<R, T> CampaignController<R, T>
where
    R: Renderer + 'static,
    T: Transport,
{
    pub fn new(
        settings: DeliverySettings,
        ledger: LedgerStore,
        renderer: Arc<R>,
        transport: T,
    ) -> Self {
        Self {
            renderer,
            transport,
            ledger,
            settings,
            stop: StopSignal::new(),
        }
    }

    /// Share an externally owned stop signal (e.g. wired to Ctrl-C)
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn ledger(&self) -> &LedgerStore {
        &self.ledger
    }

    /// Fetch every contact from `source`, then run.
    ///
    /// A source failure aborts before any message is sent.
    pub async fn run_from_source<S>(
        &self,
        source: &S,
        options: RunOptions,
        context: RenderContext,
    ) -> Result<RunSummary>
    where
        S: ContactSource,
    {
        debug!(to = ?RunPhase::Fetching, "Run phase change");
        let contacts = fetch_all(source, DEFAULT_PAGE_SIZE).await?;
        info!(contacts = contacts.len(), "Fetched contacts");
        self.run(contacts, options, context).await
    }

    #[instrument(
        skip(self, contacts, context),
        fields(mode = %options.mode, dry_run = options.dry_run, contacts = contacts.len())
    )]
    pub async fn run(
        &self,
        contacts: Vec<Contact>,
        options: RunOptions,
        context: RenderContext,
    ) -> Result<RunSummary> {
        let mut state = RunState::new(contacts.len());

        let sent = self.ledger.sent_set()?;
        let (mut pending, skipped) = filter_pending(contacts, &sent);
        state.skipped = skipped;
        state.pending = pending.len();

        if let Some(limit) = options.limit {
            pending.truncate(limit);
        }

        info!(
            total = state.total,
            already_sent = sent.len(),
            skipped,
            pending = state.pending,
            attempting = pending.len(),
            "Filtered contacts against sent ledger"
        );

        if pending.is_empty() {
            state.enter(RunPhase::Idle);
            info!("No pending contacts; nothing to send");
            return Ok(state.finish(&options));
        }

        if options.dry_run {
            self.dry_run(&pending, &options, &mut state);
            return Ok(state.finish(&options));
        }

        let context = Arc::new(context);
        match options.mode {
            SendMode::Sequential => {
                state.enter(RunPhase::SequentialLoop);
                self.run_sequential(&pending, &context, &mut state).await?;
            }
            SendMode::Batched => {
                state.enter(RunPhase::BatchLoop);
                self.run_batched(&pending, &context, &mut state).await?;
            }
        }

        if state.interrupted {
            warn!(
                sent = state.sent,
                failed = state.failed,
                "Run interrupted; re-run to resume"
            );
        }

        Ok(state.finish(&options))
    }

    fn dry_run(&self, pending: &[Contact], options: &RunOptions, state: &mut RunState) {
        for contact in pending {
            info!(email = %contact.email, name = %contact.display_name, "Dry run: would send");
        }
        state.sent = pending.len();
        if options.mode == SendMode::Batched {
            state.batches = batch_count(pending.len(), self.settings.batch_size);
        }
    }

    async fn run_sequential(
        &self,
        pending: &[Contact],
        context: &Arc<RenderContext>,
        state: &mut RunState,
    ) -> Result<()> {
        let count = pending.len();
        for (index, contact) in pending.iter().enumerate() {
            if self.stop.is_stopped() {
                state.interrupted = true;
                break;
            }

            self.deliver_one(contact, context, state).await?;

            let done = index + 1;
            if done % 10 == 0 || done == count {
                info!(done, count, sent = state.sent, failed = state.failed, "Progress");
            }

            if done < count && self.stop.sleep(self.settings.send_delay).await {
                state.interrupted = true;
                break;
            }
        }
        Ok(())
    }

    async fn deliver_one(
        &self,
        contact: &Contact,
        context: &Arc<RenderContext>,
        state: &mut RunState,
    ) -> Result<()> {
        let rendered =
            render_one(Arc::clone(&self.renderer), contact.clone(), Arc::clone(context)).await;
        let html = match rendered {
            Ok(html) => html,
            Err(e) => {
                warn!(email = %contact.email, error = %e, "Render failed");
                self.ledger
                    .record_failed(vec![FailedEntry::now(contact.clone(), render_failure(&e))])?;
                state.failed += 1;
                return Ok(());
            }
        };

        let email = self.outbound(contact, html);
        match self.transport.send(&email).await {
            Ok(receipt) => {
                self.ledger.record_sent(&[&contact.email])?;
                state.sent += 1;
                info!(
                    email = %contact.email,
                    message_id = receipt.message_id.as_deref().unwrap_or("-"),
                    "Sent"
                );
            }
            Err(e) => {
                warn!(email = %contact.email, error = %e, "Send failed");
                self.ledger
                    .record_failed(vec![FailedEntry::now(contact.clone(), e.to_string())])?;
                state.failed += 1;
            }
        }
        Ok(())
    }

    async fn run_batched(
        &self,
        pending: &[Contact],
        context: &Arc<RenderContext>,
        state: &mut RunState,
    ) -> Result<()> {
        let batches = partition(pending, self.settings.batch_size);
        let count = batches.len();

        for (index, batch) in batches.into_iter().enumerate() {
            if self.stop.is_stopped() {
                state.interrupted = true;
                break;
            }

            state.batches += 1;
            self.deliver_batch(index + 1, count, batch, context, state)
                .await?;

            if index + 1 < count && self.stop.sleep(self.settings.batch_delay).await {
                state.interrupted = true;
                break;
            }
        }
        Ok(())
    }

    #[instrument(skip(self, batch, context, state), fields(size = batch.len()))]
    async fn deliver_batch(
        &self,
        number: usize,
        count: usize,
        batch: &[Contact],
        context: &Arc<RenderContext>,
        state: &mut RunState,
    ) -> Result<()> {
        let rendered = render_all(&self.renderer, batch, context, self.settings.render_workers).await;

        let mut failures = Vec::new();
        let mut messages = Vec::with_capacity(rendered.len());
        let mut submitted = Vec::with_capacity(rendered.len());
        for item in rendered {
            match item.html {
                Ok(html) => {
                    messages.push(self.outbound(&item.contact, html));
                    submitted.push(item.contact);
                }
                Err(e) => {
                    warn!(email = %item.contact.email, error = %e, "Render failed");
                    failures.push(FailedEntry::now(item.contact, render_failure(&e)));
                }
            }
        }

        let mut delivered = Vec::with_capacity(submitted.len());
        if !messages.is_empty() {
            match self.transport.send_batch(&messages).await {
                Ok(outcomes) => {
                    let mut by_recipient: HashMap<String, DeliveryStatus> = outcomes
                        .into_iter()
                        .map(|o| (normalize_email(&o.recipient), o.status))
                        .collect();

                    for contact in submitted {
                        match by_recipient.remove(&contact.email) {
                            Some(DeliveryStatus::Sent { .. }) => delivered.push(contact.email),
                            Some(DeliveryStatus::Failed { reason }) => {
                                failures.push(FailedEntry::now(contact, reason));
                            }
                            None => failures.push(FailedEntry::now(
                                contact,
                                "no delivery result reported by transport",
                            )),
                        }
                    }
                }
                Err(e) => {
                    error!(
                        transport = self.transport.name(),
                        error = %e,
                        "Batch send failed; marking every member failed"
                    );
                    let reason = e.to_string();
                    failures.extend(
                        submitted
                            .into_iter()
                            .map(|contact| FailedEntry::now(contact, reason.clone())),
                    );
                }
            }
        }

        let sent = delivered.len();
        let failed = failures.len();
        self.ledger.record_sent(&delivered[..])?;
        self.ledger.record_failed(failures)?;
        state.sent += sent;
        state.failed += failed;

        info!(
            batch = number,
            of = count,
            sent,
            failed,
            total_sent = state.sent,
            total_failed = state.failed,
            "Batch complete"
        );
        Ok(())
    }

    fn outbound(&self, contact: &Contact, html: String) -> OutboundEmail {
        let email = OutboundEmail::new(
            &self.settings.from,
            &contact.email,
            &self.settings.subject,
            html,
        );
        match &self.settings.reply_to {
            Some(reply_to) => email.with_reply_to(reply_to),
            None => email,
        }
    }
}
