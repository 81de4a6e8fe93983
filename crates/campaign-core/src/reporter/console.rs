//! Console reporter
//!
//! Plain-text output with box-drawn headers, matching what an operator
//! expects to see at the end of a run.

use std::fmt::{self, Write};

use crate::summary::{RunOutcome, RunSummary};
use crate::tracking::TrackingReport;

const RULE: &str = "────────────────────────────────────────────────────────────────";

pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn format_summary(output: &mut String, summary: &RunSummary) -> fmt::Result {
        writeln!(output)?;
        writeln!(output, "╔══════════════════════════════════════════════════════════════╗")?;
        writeln!(output, "║                      CAMPAIGN SUMMARY                        ║")?;
        writeln!(output, "╚══════════════════════════════════════════════════════════════╝")?;
        writeln!(output)?;

        if summary.dry_run {
            writeln!(output, "DRY RUN: no emails were sent and no ledgers were changed")?;
            writeln!(output)?;
        }

        writeln!(output, "Mode:       {}", summary.mode)?;
        writeln!(output, "Started:    {}", summary.started_at.to_rfc3339())?;
        writeln!(output, "Duration:   {:.1}s", summary.duration.as_secs_f64())?;
        if summary.batches > 0 {
            writeln!(output, "Batches:    {}", summary.batches)?;
        }
        writeln!(output)?;

        let sent_label = if summary.dry_run { "Would send:" } else { "Sent:" };
        writeln!(output, "Total:      {}", summary.total)?;
        writeln!(output, "{:<11} {}", sent_label, summary.sent)?;
        writeln!(output, "Failed:     {}", summary.failed)?;
        writeln!(output, "Skipped:    {}", summary.skipped)?;
        if summary.not_attempted > 0 {
            writeln!(output, "Remaining:  {}", summary.not_attempted)?;
        }
        if !summary.dry_run && summary.sent + summary.failed > 0 {
            writeln!(output, "Success:    {:.1}%", summary.success_rate())?;
        }

        writeln!(output)?;
        writeln!(output, "{RULE}")?;
        let (symbol, status) = match summary.outcome {
            RunOutcome::Completed if summary.failed == 0 => ("✓", "COMPLETED"),
            RunOutcome::Completed => ("!", "COMPLETED WITH FAILURES"),
            RunOutcome::NothingToSend => ("✓", "NOTHING TO SEND"),
            RunOutcome::Interrupted => ("✗", "INTERRUPTED"),
        };
        writeln!(output, "Status: {symbol} {status}")?;

        if summary.is_interrupted() {
            writeln!(output, "Progress is saved. Run the same command again to resume.")?;
        }
        if summary.failed > 0 && !summary.dry_run {
            writeln!(output, "Failed recipients were written to the failed ledger.")?;
        }
        writeln!(output)?;
        Ok(())
    }

    pub fn format_tracking(output: &mut String, report: &TrackingReport) -> fmt::Result {
        writeln!(output)?;
        writeln!(output, "╔══════════════════════════════════════════════════════════════╗")?;
        writeln!(output, "║                  EMAIL TRACKING STATISTICS                   ║")?;
        writeln!(output, "╚══════════════════════════════════════════════════════════════╝")?;
        writeln!(output)?;

        if report.is_empty() {
            writeln!(output, "No tracking data found.")?;
            writeln!(output)?;
            return Ok(());
        }

        writeln!(output, "Tracked records: {}", report.records)?;
        writeln!(output)?;

        writeln!(output, "Overall")?;
        writeln!(output, "{RULE}")?;
        writeln!(output, "  Total opens:           {}", report.overall.total_opens)?;
        writeln!(output, "  Unique recipients:     {}", report.overall.unique_recipients)?;
        writeln!(output, "  Avg opens/recipient:   {:.1}", report.overall.average_opens)?;
        writeln!(output)?;

        writeln!(output, "Campaigns")?;
        writeln!(output, "{RULE}")?;
        for campaign in &report.campaigns {
            writeln!(output, "  {}", campaign.campaign)?;
            writeln!(
                output,
                "    Recipients: {}, Opens: {}, Avg opens/recipient: {:.1}",
                campaign.recipients, campaign.opens, campaign.average_opens
            )?;
        }
        writeln!(output)?;

        writeln!(output, "Geographic distribution")?;
        writeln!(output, "{RULE}")?;
        for country in &report.countries {
            writeln!(
                output,
                "  {}: {} ({:.1}%)",
                country.country, country.records, country.percentage
            )?;
        }
        writeln!(output)?;

        writeln!(
            output,
            "Recent activity (last {} days)",
            report.recent.window_days
        )?;
        writeln!(output, "{RULE}")?;
        if report.recent.recipients == 0 {
            writeln!(output, "  No opens in the last {} days", report.recent.window_days)?;
        } else {
            writeln!(output, "  Recent opens: {}", report.recent.recipients)?;
            for open in &report.recent.latest {
                writeln!(
                    output,
                    "  - {} ({}) - {}",
                    open.email,
                    open.campaign,
                    open.opened_at.format("%Y-%m-%d %H:%M")
                )?;
            }
        }
        writeln!(output)?;

        writeln!(output, "Top {} most engaged", report.top_engaged.len())?;
        writeln!(output, "{RULE}")?;
        for (rank, recipient) in report.top_engaged.iter().enumerate() {
            writeln!(
                output,
                "  {}. {} - {} opens ({})",
                rank + 1,
                recipient.email,
                recipient.open_count,
                recipient.campaign
            )?;
        }
        writeln!(output)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SendMode;
    use crate::tracking::TrackingRecord;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn summary(outcome: RunOutcome, dry_run: bool) -> RunSummary {
        RunSummary {
            mode: SendMode::Sequential,
            dry_run,
            total: 3,
            sent: 1,
            failed: 1,
            skipped: 1,
            not_attempted: 0,
            batches: 0,
            outcome,
            started_at: Utc.with_ymd_and_hms(2025, 6, 30, 9, 0, 0).unwrap(),
            duration: Duration::from_millis(1200),
        }
    }

    #[test]
    fn test_summary_counts() {
        let mut out = String::new();
        ConsoleReporter::format_summary(&mut out, &summary(RunOutcome::Completed, false)).unwrap();
        assert!(out.contains("Total:      3"));
        assert!(out.contains("Sent:       1"));
        assert!(out.contains("Failed:     1"));
        assert!(out.contains("Skipped:    1"));
        assert!(out.contains("Success:    50.0%"));
        assert!(out.contains("COMPLETED WITH FAILURES"));
        assert!(!out.contains("Batches:"));
    }

    #[test]
    fn test_summary_interrupted_hint() {
        let mut out = String::new();
        ConsoleReporter::format_summary(&mut out, &summary(RunOutcome::Interrupted, false))
            .unwrap();
        assert!(out.contains("INTERRUPTED"));
        assert!(out.contains("to resume"));
    }

    #[test]
    fn test_summary_dry_run_banner() {
        let mut out = String::new();
        ConsoleReporter::format_summary(&mut out, &summary(RunOutcome::Completed, true)).unwrap();
        assert!(out.contains("DRY RUN"));
        assert!(out.contains("Would send: 1"));
    }

    #[test]
    fn test_tracking_sections() {
        let now = Utc.with_ymd_and_hms(2025, 6, 30, 12, 0, 0).unwrap();
        let records = vec![TrackingRecord {
            email: "a@x.org".into(),
            campaign: "launch".into(),
            open_count: 2,
            first_opened: Some(now),
            last_opened: Some(now),
            country: "United Kingdom".into(),
        }];
        let report = TrackingReport::build(&records, now);

        let mut out = String::new();
        ConsoleReporter::format_tracking(&mut out, &report).unwrap();
        assert!(out.contains("Total opens:           2"));
        assert!(out.contains("United Kingdom: 1 (100.0%)"));
        assert!(out.contains("a@x.org (launch) - 2025-06-30 12:00"));
        assert!(out.contains("1. a@x.org - 2 opens (launch)"));
    }

    #[test]
    fn test_tracking_empty() {
        let report = TrackingReport::build(&[], Utc::now());
        let mut out = String::new();
        ConsoleReporter::format_tracking(&mut out, &report).unwrap();
        assert!(out.contains("No tracking data found."));
    }
}
