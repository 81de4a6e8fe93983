//! Renderer seam: contact + run context → HTML body

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::contact::Contact;

/// Campaign-wide values computed once per run and shared by every render.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderContext {
    /// Live response count, if it could be fetched
    pub live_count: Option<u64>,

    /// Goal the live count is measured against
    pub target_count: u64,

    /// Whole hours left before the campaign deadline
    pub hours_remaining: Option<u32>,

    /// Free-form values exposed to templates
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

impl RenderContext {
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("contact {email} is missing {field}")]
    MissingField { email: String, field: String },

    #[error("template error: {0}")]
    Template(String),

    #[error("render task aborted: {0}")]
    Aborted(String),
}

/// Produces the HTML body for one contact.
///
/// Implementations must be pure with respect to the contact and context:
/// renders for different contacts run concurrently on blocking threads.
pub trait Renderer: Send + Sync {
    fn render(&self, contact: &Contact, context: &RenderContext) -> Result<String, RenderError>;
}

impl<F> Renderer for F
where
    F: Fn(&Contact, &RenderContext) -> Result<String, RenderError> + Send + Sync,
{
    fn render(&self, contact: &Contact, context: &RenderContext) -> Result<String, RenderError> {
        self(contact, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_renderer() {
        let renderer = |contact: &Contact, ctx: &RenderContext| -> Result<String, RenderError> {
            Ok(format!(
                "<p>Hi {}, {} of {}</p>",
                contact.first_name,
                ctx.live_count.unwrap_or(0),
                ctx.target_count
            ))
        };
        let ctx = RenderContext {
            live_count: Some(42),
            target_count: 100,
            ..Default::default()
        };

        let html = renderer.render(&Contact::new("sam@x.org"), &ctx).unwrap();
        assert_eq!(html, "<p>Hi sam, 42 of 100</p>");
    }

    #[test]
    fn test_context_values() {
        let ctx = RenderContext::default().with_value("site_url", "https://example.org");
        assert_eq!(ctx.value("site_url"), Some("https://example.org"));
        assert_eq!(ctx.value("missing"), None);
    }

    #[test]
    fn test_missing_field_message() {
        let err = RenderError::MissingField {
            email: "a@x.org".into(),
            field: "referral code".into(),
        };
        assert_eq!(err.to_string(), "contact a@x.org is missing referral code");
    }
}
