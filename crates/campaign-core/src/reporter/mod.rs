//! Run summary and tracking report output
//!
//! # Output Formats
//!
//! - **Console**: human-readable, printed at the end of every run
//! - **Json** / **JsonPretty**: machine-readable for scripts
//!
//! # Example
//!
//! ```no_run
//! use campaign_core::reporter::{OutputFormat, Reporter};
//! use campaign_core::RunSummary;
//!
//! # fn example(summary: RunSummary) -> Result<(), campaign_core::reporter::ReportError> {
//! Reporter::new(OutputFormat::Console).report(&summary)?;
//! Reporter::new(OutputFormat::Console).write_to_file(&summary, "campaign-summary.txt")?;
//! # Ok(())
//! # }
//! ```

mod console;
mod json;

use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::summary::RunSummary;
use crate::tracking::TrackingReport;

pub use console::ConsoleReporter;
pub use json::JsonReporter;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Failed to format report: {0}")]
    Format(#[from] std::fmt::Error),

    #[error("Failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to write report: {0}")]
    Io(#[from] io::Error),
}

/// Output format for reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    JsonPretty,
    #[default]
    Console,
}

/// Something the reporter knows how to print
pub trait Reportable: Serialize {
    fn write_console(&self, output: &mut String) -> std::fmt::Result;
}

impl Reportable for RunSummary {
    fn write_console(&self, output: &mut String) -> std::fmt::Result {
        ConsoleReporter::format_summary(output, self)
    }
}

impl Reportable for TrackingReport {
    fn write_console(&self, output: &mut String) -> std::fmt::Result {
        ConsoleReporter::format_tracking(output, self)
    }
}

pub struct Reporter {
    format: OutputFormat,
}

impl Reporter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print to stdout
    pub fn report<T: Reportable>(&self, item: &T) -> Result<(), ReportError> {
        let output = self.format(item)?;
        let mut stdout = io::stdout().lock();
        stdout.write_all(output.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }

    pub fn write_to_file<T: Reportable, P: AsRef<Path>>(
        &self,
        item: &T,
        path: P,
    ) -> Result<(), ReportError> {
        let output = self.format(item)?;
        fs::write(path, output)?;
        Ok(())
    }

    pub fn format<T: Reportable>(&self, item: &T) -> Result<String, ReportError> {
        match self.format {
            OutputFormat::Json => JsonReporter::format(item, false),
            OutputFormat::JsonPretty => JsonReporter::format(item, true),
            OutputFormat::Console => {
                let mut output = String::new();
                item.write_console(&mut output)?;
                Ok(output)
            }
        }
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(OutputFormat::default())
    }
}
