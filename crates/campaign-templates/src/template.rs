//! Placeholder substitution for the campaign HTML template

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use urlencoding::encode;

use campaign_core::{Contact, RenderContext, RenderError, Renderer, TemplateConfig};

use crate::share::ShareLinks;

lazy_static! {
    /// `{{ name }}` placeholders
    static ref PLACEHOLDER: Regex = Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").unwrap();

    /// Countdown banner baked into the compiled template
    static ref HOURS_BANNER: Regex = Regex::new(r"Less than \d+ hours remaining!").unwrap();
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("failed to read template {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template {0} is empty")]
    Empty(PathBuf),
}

/// Renders the campaign template for one contact.
///
/// Known placeholders are filled from the contact, the run context and the
/// contact's share links. Anything else is looked up in the contact's extra
/// fields, then the context values; unknown placeholders are left as they are.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    template: String,
    site_url: String,
    share_text: String,
    fallback_count: u64,
}

impl TemplateRenderer {
    pub fn new(template: impl Into<String>, config: &TemplateConfig) -> Self {
        Self {
            template: template.into(),
            site_url: config.site_url.clone(),
            share_text: config.share_text.clone(),
            fallback_count: config.fallback_count,
        }
    }

    /// Load the template file named by the config
    pub fn from_config(config: &TemplateConfig) -> Result<Self, TemplateError> {
        let template = read_template(&config.path)?;
        debug!(path = %config.path.display(), bytes = template.len(), "Loaded template");
        Ok(Self::new(template, config))
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

fn read_template(path: &Path) -> Result<String, TemplateError> {
    let template = fs::read_to_string(path).map_err(|source| TemplateError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if template.trim().is_empty() {
        return Err(TemplateError::Empty(path.to_path_buf()));
    }
    Ok(template)
}

/// Share of `target` reached, one decimal place
fn progress_percentage(count: u64, target: u64) -> String {
    if target == 0 {
        return "0.0".to_string();
    }
    format!("{:.1}", count as f64 / target as f64 * 100.0)
}

impl Renderer for TemplateRenderer {
    fn render(&self, contact: &Contact, context: &RenderContext) -> Result<String, RenderError> {
        let code = contact
            .referral_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| RenderError::MissingField {
                email: contact.email.clone(),
                field: "referral code".into(),
            })?;

        let links = ShareLinks::new(&self.site_url, code, &self.share_text);
        let count = context.live_count.unwrap_or(self.fallback_count);
        let target = context.target_count;

        let resolve = |name: &str| -> Option<String> {
            let value = match name {
                "user_referral_code" => code.to_string(),
                "user_email" => encode(&contact.email).into_owned(),
                "name" => contact.display_name.clone(),
                "first_name" => contact.first_name.clone(),
                "response_count" => count.to_string(),
                "target_count" => target.to_string(),
                "needed_count" => target.saturating_sub(count).to_string(),
                "progress_percentage" => progress_percentage(count, target),
                "share_text_encoded" => encode(&self.share_text).into_owned(),
                "share_url" => links.base.clone(),
                "share_twitter" => links.twitter.clone(),
                "share_facebook" => links.facebook.clone(),
                "share_whatsapp" => links.whatsapp.clone(),
                "share_linkedin" => links.linkedin.clone(),
                "share_email" => links.email.clone(),
                "share_sms" => links.sms.clone(),
                other => contact.field(other).or_else(|| context.value(other))?.to_string(),
            };
            Some(value)
        };

        let html = PLACEHOLDER.replace_all(&self.template, |caps: &Captures| {
            resolve(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        });

        let html = match context.hours_remaining {
            Some(hours) => HOURS_BANNER
                .replace_all(&html, format!("Less than {hours} hours remaining!"))
                .into_owned(),
            None => html.into_owned(),
        };

        Ok(html)
    }
}
