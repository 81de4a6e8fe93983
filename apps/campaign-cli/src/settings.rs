//! Configuration loading: file, then environment, then command-line flags

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

use campaign_core::{CampaignConfig, SendMode};

/// Looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "campaign.toml";

/// Flags that override configured values
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub mode: Option<SendMode>,
    pub batch_size: Option<usize>,
}

pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<CampaignConfig> {
    load_with(path, overrides, |key| std::env::var(key).ok())
}

pub fn load_with<F>(path: Option<&Path>, overrides: &Overrides, lookup: F) -> Result<CampaignConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let config = match path {
        Some(path) => CampaignConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            CampaignConfig::from_file(DEFAULT_CONFIG_FILE)
                .with_context(|| format!("Failed to load {DEFAULT_CONFIG_FILE}"))?
        }
        None => {
            debug!("No config file, using defaults");
            CampaignConfig::default()
        }
    };

    let mut config = config.apply_overrides(lookup);
    if let Some(mode) = overrides.mode {
        config.campaign.mode = mode;
    }
    if let Some(size) = overrides.batch_size {
        config.delivery.batch_size = size;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_precedence_file_env_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("campaign.toml");
        std::fs::write(
            &path,
            r#"
[campaign]
subject = "From file"
mode = "sequential"

[delivery]
batch_size = 20
"#,
        )
        .unwrap();

        let env: HashMap<&str, &str> =
            [("CAMPAIGN_SUBJECT", "From env"), ("BATCH_SIZE", "30")].into_iter().collect();
        let overrides = Overrides {
            mode: None,
            batch_size: Some(40),
        };

        let config =
            load_with(Some(&path), &overrides, |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.campaign.subject, "From env");
        assert_eq!(config.campaign.mode, SendMode::Sequential);
        assert_eq!(config.delivery.batch_size, 40);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = load_with(
            Some(Path::new("/nonexistent/campaign.toml")),
            &Overrides::default(),
            |_| None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let env: HashMap<&str, &str> = [("CAMPAIGN_FROM", " ")].into_iter().collect();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.toml");
        std::fs::write(&path, "").unwrap();

        let result = load_with(Some(&path), &Overrides::default(), |k| {
            env.get(k).map(|v| v.to_string())
        });
        assert!(result.is_err());
    }
}
