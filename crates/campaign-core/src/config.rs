//! Campaign configuration
//!
//! Loaded from an optional TOML file, then overridden from the environment.
//! Credentials are never read from here; transports and sources pick them up
//! from their own environment variables.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ledger::{LedgerStore, DEFAULT_FAILED_FILE, DEFAULT_SENT_FILE};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// How pending contacts are dispatched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendMode {
    /// One message at a time, persisting after each
    Sequential,
    /// Fixed-size batches through the provider's batch endpoint
    #[default]
    Batched,
}

impl std::fmt::Display for SendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendMode::Sequential => write!(f, "sequential"),
            SendMode::Batched => write!(f, "batched"),
        }
    }
}

impl std::str::FromStr for SendMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" | "slow" => Ok(SendMode::Sequential),
            "batched" | "batch" | "fast" => Ok(SendMode::Batched),
            other => Err(ConfigError::Invalid(format!("unknown send mode '{other}'"))),
        }
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignConfig {
    #[serde(default)]
    pub campaign: MessageConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub template: TemplateConfig,
}

impl CampaignConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Apply overrides from process environment variables
    pub fn apply_env(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (used by tests)
    pub fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(from) = lookup("CAMPAIGN_FROM") {
            self.campaign.from = from;
        }
        if let Some(subject) = lookup("CAMPAIGN_SUBJECT") {
            self.campaign.subject = subject;
        }
        if let Some(mode) = lookup("CAMPAIGN_MODE").and_then(|v| v.parse().ok()) {
            self.campaign.mode = mode;
        }
        if let Some(size) = lookup("BATCH_SIZE").and_then(|v| v.parse().ok()) {
            self.delivery.batch_size = size;
        }
        if let Some(workers) = lookup("MAX_WORKERS").and_then(|v| v.parse().ok()) {
            self.delivery.render_workers = workers;
        }
        if let Some(dir) = lookup("CAMPAIGN_LEDGER_DIR") {
            self.ledger.dir = PathBuf::from(dir);
        }
        if let Some(site) = lookup("SITE_URL") {
            self.template.site_url = site;
        }
        if let Some(api) = lookup("API_URL") {
            self.template.api_url = Some(api);
        }
        self
    }

    /// Reject values that would make a run meaningless
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.campaign.from.trim().is_empty() {
            return Err(ConfigError::Invalid("sender address is empty".into()));
        }
        if self.campaign.subject.trim().is_empty() {
            return Err(ConfigError::Invalid("subject is empty".into()));
        }
        if self.delivery.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".into()));
        }
        if self.delivery.render_workers == 0 {
            return Err(ConfigError::Invalid(
                "render_workers must be at least 1".into(),
            ));
        }
        if self.delivery.max_per_second == Some(0) {
            return Err(ConfigError::Invalid(
                "max_per_second must be at least 1 when set".into(),
            ));
        }
        Ok(())
    }

    /// Ledger store described by the `[ledger]` table
    pub fn ledger_store(&self) -> LedgerStore {
        LedgerStore::with_file_names(
            &self.ledger.dir,
            &self.ledger.sent_file,
            &self.ledger.failed_file,
        )
    }
}

/// Sender identity and subject line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageConfig {
    #[serde(default = "default_from")]
    pub from: String,
    #[serde(default)]
    pub reply_to: Option<String>,
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default)]
    pub mode: SendMode,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            from: default_from(),
            reply_to: None,
            subject: default_subject(),
            mode: SendMode::default(),
        }
    }
}

fn default_from() -> String {
    "North Swanage Traffic Concern Group <engineering@nstcg.org>".to_string()
}

fn default_subject() -> String {
    "Less than 24 hours left to have your say on Shore Road".to_string()
}

/// Pacing and parallelism
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Recipients per batch call (default: 100)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause between sequential sends in milliseconds (default: 250)
    #[serde(default = "default_send_delay_ms")]
    pub send_delay_ms: u64,
    /// Pause between batches in milliseconds (default: 100)
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    /// Concurrent renders inside a batch (default: 10)
    #[serde(default = "default_render_workers")]
    pub render_workers: usize,
    /// Provider call ceiling; unset means no extra throttling
    #[serde(default)]
    pub max_per_second: Option<u32>,
}

impl DeliveryConfig {
    pub fn send_delay(&self) -> Duration {
        Duration::from_millis(self.send_delay_ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            send_delay_ms: default_send_delay_ms(),
            batch_delay_ms: default_batch_delay_ms(),
            render_workers: default_render_workers(),
            max_per_second: None,
        }
    }
}

fn default_batch_size() -> usize {
    100
}

fn default_send_delay_ms() -> u64 {
    250
}

fn default_batch_delay_ms() -> u64 {
    100
}

fn default_render_workers() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_sent_file")]
    pub sent_file: String,
    #[serde(default = "default_failed_file")]
    pub failed_file: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            dir: default_ledger_dir(),
            sent_file: default_sent_file(),
            failed_file: default_failed_file(),
        }
    }
}

fn default_ledger_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_sent_file() -> String {
    DEFAULT_SENT_FILE.to_string()
}

fn default_failed_file() -> String {
    DEFAULT_FAILED_FILE.to_string()
}

/// Inputs to the HTML template renderer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Compiled HTML template
    #[serde(default = "default_template_path")]
    pub path: PathBuf,
    /// Site that share links point at
    #[serde(default = "default_site_url")]
    pub site_url: String,
    /// Base URL of the API serving `/get-count`; unset skips the live count
    #[serde(default)]
    pub api_url: Option<String>,
    /// Response goal shown in the progress bar (default: 1000)
    #[serde(default = "default_target_count")]
    pub target_count: u64,
    /// Count used when the live counter cannot be reached (default: 555)
    #[serde(default = "default_fallback_count")]
    pub fallback_count: u64,
    /// Message pre-filled in share links
    #[serde(default = "default_share_text")]
    pub share_text: String,
    /// Deadline for the hours-remaining banner; unset means end of today
    #[serde(default)]
    pub deadline: Option<chrono::DateTime<chrono::FixedOffset>>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            path: default_template_path(),
            site_url: default_site_url(),
            api_url: None,
            target_count: default_target_count(),
            fallback_count: default_fallback_count(),
            share_text: default_share_text(),
            deadline: None,
        }
    }
}

fn default_template_path() -> PathBuf {
    PathBuf::from("templates/encourage.html")
}

fn default_site_url() -> String {
    "https://nstcg.org".to_string()
}

fn default_target_count() -> u64 {
    1000
}

fn default_fallback_count() -> u64 {
    555
}

fn default_share_text() -> String {
    "The closing of Shore Road in Swanage will have impacts on traffic, tourists and residents \
     for years to come. The survey closes midnight tonight!"
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = CampaignConfig::default();
        assert_eq!(config.delivery.batch_size, 100);
        assert_eq!(config.delivery.send_delay(), Duration::from_millis(250));
        assert_eq!(config.delivery.batch_delay(), Duration::from_millis(100));
        assert_eq!(config.delivery.render_workers, 10);
        assert_eq!(config.campaign.mode, SendMode::Batched);
        assert_eq!(config.template.target_count, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml = r#"
            [campaign]
            subject = "Final reminder"
            mode = "sequential"

            [delivery]
            batch_size = 25
            max_per_second = 2

            [ledger]
            dir = "state"
        "#;
        let config = CampaignConfig::from_toml(toml).unwrap();
        assert_eq!(config.campaign.subject, "Final reminder");
        assert_eq!(config.campaign.mode, SendMode::Sequential);
        assert_eq!(config.delivery.batch_size, 25);
        assert_eq!(config.delivery.send_delay_ms, 250);
        assert_eq!(config.delivery.max_per_second, Some(2));
        assert_eq!(
            config.ledger_store().path(crate::LedgerKind::Sent),
            PathBuf::from("state/sent-emails.json")
        );
    }

    #[test]
    fn test_parse_deadline() {
        let toml = r#"
            [template]
            deadline = "2025-06-30T23:59:59+01:00"
        "#;
        let config = CampaignConfig::from_toml(toml).unwrap();
        assert!(config.template.deadline.is_some());
    }

    #[test]
    fn test_malformed_toml_is_error() {
        let err = CampaignConfig::from_toml("[delivery\nbatch_size = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("CAMPAIGN_SUBJECT", "Override"),
            ("BATCH_SIZE", "50"),
            ("MAX_WORKERS", "not-a-number"),
            ("CAMPAIGN_MODE", "slow"),
            ("CAMPAIGN_LEDGER_DIR", "/tmp/ledgers"),
        ]
        .into_iter()
        .collect();

        let config = CampaignConfig::default()
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.campaign.subject, "Override");
        assert_eq!(config.delivery.batch_size, 50);
        assert_eq!(config.delivery.render_workers, 10);
        assert_eq!(config.campaign.mode, SendMode::Sequential);
        assert_eq!(config.ledger.dir, PathBuf::from("/tmp/ledgers"));
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let mut config = CampaignConfig::default();
        config.delivery.batch_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_empty_sender() {
        let mut config = CampaignConfig::default();
        config.campaign.from = " ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_send_mode_parse() {
        assert_eq!("Batched".parse::<SendMode>().unwrap(), SendMode::Batched);
        assert_eq!("fast".parse::<SendMode>().unwrap(), SendMode::Batched);
        assert_eq!("sequential".parse::<SendMode>().unwrap(), SendMode::Sequential);
        assert!("parallel".parse::<SendMode>().is_err());
    }
}
