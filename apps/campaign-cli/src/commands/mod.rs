//! Subcommand implementations

pub mod preview;
pub mod send;
pub mod stats;

use chrono::{DateTime, Local};
use std::path::PathBuf;

/// clap parser for counts that must be at least 1
pub(crate) fn parse_positive(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

/// `--flag [PATH]`: the given path, or a dated default name
pub(crate) fn output_path(
    flag: &Option<Option<PathBuf>>,
    default_name: impl FnOnce() -> String,
) -> Option<PathBuf> {
    flag.as_ref()
        .map(|path| path.clone().unwrap_or_else(|| PathBuf::from(default_name())))
}

pub(crate) fn summary_file_name(now: DateTime<Local>) -> String {
    format!("campaign-summary-{}.txt", now.format("%Y-%m-%d"))
}
