//! Durable record of delivery outcomes
//!
//! Two independent JSON files live in the ledger directory:
//!
//! - `sent-emails.json`: array of lower-cased addresses that were delivered
//! - `failed-emails.json`: array of contact snapshots with `error` and
//!   `timestamp` fields
//!
//! A missing file reads as an empty list. A file that does not parse is
//! logged and read as empty. Every write is a full rewrite through a
//! temporary file renamed into place, and every `record_*` call re-reads the
//! file immediately before writing so edits made by other tooling between
//! writes are merged rather than clobbered. There is no cross-process lock.
//! Existing failed entries are carried over as raw JSON, so entries written
//! by older tooling survive appends even when they do not match
//! `FailedEntry`.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::contact::{normalize_email, Contact};

pub const DEFAULT_SENT_FILE: &str = "sent-emails.json";
pub const DEFAULT_FAILED_FILE: &str = "failed-emails.json";

/// Which of the two ledgers an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerKind {
    Sent,
    Failed,
}

impl std::fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerKind::Sent => write!(f, "sent"),
            LedgerKind::Failed => write!(f, "failed"),
        }
    }
}

/// A failed delivery: the contact snapshot plus the reason and time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedEntry {
    #[serde(flatten)]
    pub contact: Contact,
    pub error: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// RFC 3339, or a naive ISO-8601 local time as older tooling wrote it
/// (taken as UTC).
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}

impl FailedEntry {
    /// Record a failure for `contact` at the current time
    pub fn now(contact: Contact, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            contact,
            error: if error.trim().is_empty() {
                "Unknown error".to_string()
            } else {
                error
            },
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Failed to read {kind} ledger at {path}: {source}")]
    Read {
        kind: LedgerKind,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {kind} ledger at {path}: {source}")]
    Write {
        kind: LedgerKind,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize {kind} ledger: {source}")]
    Serialize {
        kind: LedgerKind,
        #[source]
        source: serde_json::Error,
    },
}

/// File-backed sent and failed ledgers
#[derive(Debug, Clone)]
pub struct LedgerStore {
    dir: PathBuf,
    sent_file: String,
    failed_file: String,
}

impl LedgerStore {
    /// Ledgers with the default file names inside `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_file_names(dir, DEFAULT_SENT_FILE, DEFAULT_FAILED_FILE)
    }

    pub fn with_file_names(
        dir: impl Into<PathBuf>,
        sent_file: impl Into<String>,
        failed_file: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            sent_file: sent_file.into(),
            failed_file: failed_file.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of the given ledger file
    pub fn path(&self, kind: LedgerKind) -> PathBuf {
        match kind {
            LedgerKind::Sent => self.dir.join(&self.sent_file),
            LedgerKind::Failed => self.dir.join(&self.failed_file),
        }
    }

    /// Addresses already delivered, as stored
    pub fn load_sent(&self) -> Result<Vec<String>, LedgerError> {
        Ok(self.read_list(LedgerKind::Sent)?.items)
    }

    /// Lower-cased set of delivered addresses for filtering
    pub fn sent_set(&self) -> Result<HashSet<String>, LedgerError> {
        Ok(self
            .load_sent()?
            .iter()
            .map(|email| normalize_email(email))
            .collect())
    }

    /// Failure entries that match the current schema.
    ///
    /// Entries in an unrecognised shape are skipped here but stay in the
    /// file; `record_failed` never drops them.
    pub fn load_failed(&self) -> Result<Vec<FailedEntry>, LedgerError> {
        let raw = self.read_list::<Value>(LedgerKind::Failed)?.items;
        let total = raw.len();
        let entries: Vec<FailedEntry> = raw
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect();
        if entries.len() < total {
            warn!(
                skipped = total - entries.len(),
                "Some failed ledger entries have an unrecognised shape"
            );
        }
        Ok(entries)
    }

    /// Replace the sent ledger with `emails`
    pub fn save_sent(&self, emails: &[String]) -> Result<(), LedgerError> {
        self.write_list(LedgerKind::Sent, emails)
    }

    /// Replace the failed ledger with `entries`
    pub fn save_failed(&self, entries: &[FailedEntry]) -> Result<(), LedgerError> {
        self.write_list(LedgerKind::Failed, entries)
    }

    /// Merge delivered addresses into the sent ledger and persist it.
    ///
    /// Returns how many addresses were new.
    pub fn record_sent<S: AsRef<str>>(&self, emails: &[S]) -> Result<usize, LedgerError> {
        if emails.is_empty() {
            return Ok(0);
        }

        let current = self.read_list::<String>(LedgerKind::Sent)?;
        if current.corrupt {
            self.preserve_corrupt(LedgerKind::Sent);
        }

        let mut seen: HashSet<String> = current.items.iter().map(|e| normalize_email(e)).collect();
        let mut merged = current.items;
        let mut added = 0;
        for email in emails {
            let email = normalize_email(email.as_ref());
            if seen.insert(email.clone()) {
                merged.push(email);
                added += 1;
            }
        }

        if added > 0 {
            self.write_list(LedgerKind::Sent, &merged)?;
        }
        debug!(added, total = merged.len(), "Recorded sent addresses");
        Ok(added)
    }

    /// Append failure entries to the failed ledger and persist it.
    ///
    /// Existing entries are carried over as raw JSON, whatever their shape.
    pub fn record_failed(&self, entries: Vec<FailedEntry>) -> Result<(), LedgerError> {
        if entries.is_empty() {
            return Ok(());
        }

        let current = self.read_list::<Value>(LedgerKind::Failed)?;
        if current.corrupt {
            self.preserve_corrupt(LedgerKind::Failed);
        }

        let mut merged = current.items;
        let added = entries.len();
        for entry in entries {
            let value = serde_json::to_value(entry).map_err(|source| LedgerError::Serialize {
                kind: LedgerKind::Failed,
                source,
            })?;
            merged.push(value);
        }
        self.write_list(LedgerKind::Failed, &merged)?;
        debug!(added, total = merged.len(), "Recorded failed deliveries");
        Ok(())
    }

    fn read_list<T: DeserializeOwned>(&self, kind: LedgerKind) -> Result<ReadOutcome<T>, LedgerError> {
        let path = self.path(kind);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(ReadOutcome::empty(false));
            }
            Err(source) => return Err(LedgerError::Read { kind, path, source }),
        };

        if raw.trim().is_empty() {
            return Ok(ReadOutcome::empty(false));
        }

        match serde_json::from_str::<Vec<T>>(&raw) {
            Ok(items) => Ok(ReadOutcome {
                items,
                corrupt: false,
            }),
            Err(e) => {
                warn!(
                    ledger = %kind,
                    path = %path.display(),
                    error = %e,
                    "Ledger file is not valid JSON; treating as empty"
                );
                Ok(ReadOutcome::empty(true))
            }
        }
    }

    fn write_list<T: Serialize>(&self, kind: LedgerKind, items: &[T]) -> Result<(), LedgerError> {
        let path = self.path(kind);
        let write_err = |source: io::Error| LedgerError::Write {
            kind,
            path: path.clone(),
            source,
        };

        let body = serde_json::to_string_pretty(items)
            .map_err(|source| LedgerError::Serialize { kind, source })?;

        fs::create_dir_all(&self.dir).map_err(write_err)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(write_err)?;
        tmp.write_all(body.as_bytes()).map_err(write_err)?;
        tmp.write_all(b"\n").map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&path).map_err(|e| write_err(e.error))?;
        Ok(())
    }

    /// Keep a copy of an unparseable ledger before it gets overwritten
    fn preserve_corrupt(&self, kind: LedgerKind) {
        let path = self.path(kind);
        let backup = path.with_extension(format!(
            "corrupt-{}.json",
            Utc::now().format("%Y%m%d%H%M%S")
        ));
        match fs::copy(&path, &backup) {
            Ok(_) => warn!(ledger = %kind, backup = %backup.display(), "Saved corrupt ledger copy"),
            Err(e) => warn!(ledger = %kind, error = %e, "Could not copy corrupt ledger"),
        }
    }
}

struct ReadOutcome<T> {
    items: Vec<T>,
    corrupt: bool,
}

impl<T> ReadOutcome<T> {
    fn empty(corrupt: bool) -> Self {
        Self {
            items: Vec::new(),
            corrupt,
        }
    }
}
