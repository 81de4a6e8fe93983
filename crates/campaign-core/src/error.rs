//! Errors that abort a campaign run

use crate::config::ConfigError;
use crate::ledger::LedgerError;
use crate::source::SourceError;

/// Fatal run errors.
///
/// Per-contact render and transport failures never surface here; they are
/// written to the failed ledger and counted in the summary.
#[derive(Debug, thiserror::Error)]
pub enum CampaignError {
    #[error("Contact source failed: {0}")]
    Source(#[from] SourceError),

    #[error("Ledger I/O failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, CampaignError>;
