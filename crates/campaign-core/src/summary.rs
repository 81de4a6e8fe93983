//! Result of one campaign run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::SendMode;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every pending contact was attempted
    Completed,
    /// All contacts were already in the sent ledger
    NothingToSend,
    /// A stop signal ended the run early
    Interrupted,
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunOutcome::Completed => write!(f, "completed"),
            RunOutcome::NothingToSend => write!(f, "nothing to send"),
            RunOutcome::Interrupted => write!(f, "interrupted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub mode: SendMode,
    pub dry_run: bool,
    /// Contacts handed to the run
    pub total: usize,
    /// Delivered, or would be delivered in a dry run
    pub sent: usize,
    pub failed: usize,
    /// Already in the sent ledger, or duplicated within the contact list
    pub skipped: usize,
    /// Pending contacts never attempted because the run stopped early
    pub not_attempted: usize,
    pub batches: usize,
    pub outcome: RunOutcome,
    pub started_at: DateTime<Utc>,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

impl RunSummary {
    /// Contacts that were eligible for sending
    pub fn pending(&self) -> usize {
        self.total - self.skipped
    }

    pub fn is_interrupted(&self) -> bool {
        self.outcome == RunOutcome::Interrupted
    }

    /// Percentage of attempted deliveries that succeeded
    pub fn success_rate(&self) -> f64 {
        let attempted = self.sent + self.failed;
        if attempted == 0 {
            0.0
        } else {
            self.sent as f64 / attempted as f64 * 100.0
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
