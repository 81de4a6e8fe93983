//! Campaign templates - turn a contact into the campaign email body
//!
//! - [`TemplateRenderer`]: fills `{{placeholder}}`s in the compiled HTML template
//! - [`ShareLinks`]: per-platform referral share URLs
//! - [`fetch_response_count`]: live counter with a fallback
//! - [`hours_remaining`]: countdown until the campaign deadline
//!
//! [`run_context`] gathers the per-run values once, before any rendering.

pub mod counter;
pub mod deadline;
pub mod share;
pub mod template;

use chrono::{DateTime, FixedOffset};

use campaign_core::{RenderContext, TemplateConfig};

pub use counter::{fetch_response_count, COUNTER_TIMEOUT};
pub use deadline::hours_remaining;
pub use share::{referral_url, Platform, ShareLinks};
pub use template::{TemplateError, TemplateRenderer};

/// Build the render context from values already gathered
pub fn build_context(
    config: &TemplateConfig,
    live_count: u64,
    now: DateTime<FixedOffset>,
) -> RenderContext {
    RenderContext {
        live_count: Some(live_count),
        target_count: config.target_count,
        hours_remaining: Some(hours_remaining(config.deadline, now)),
        values: Default::default(),
    }
    .with_value("site_url", config.site_url.trim_end_matches('/'))
}

/// Fetch the live count (when an API is configured) and build the render context
pub async fn run_context(config: &TemplateConfig, now: DateTime<FixedOffset>) -> RenderContext {
    let count = match &config.api_url {
        Some(api_url) => fetch_response_count(api_url, config.fallback_count).await,
        None => config.fallback_count,
    };
    build_context(config, count, now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_context() {
        let now = DateTime::parse_from_rfc3339("2025-06-30T20:15:00+01:00").unwrap();
        let ctx = build_context(&TemplateConfig::default(), 612, now);

        assert_eq!(ctx.live_count, Some(612));
        assert_eq!(ctx.target_count, 1000);
        assert_eq!(ctx.hours_remaining, Some(3));
        assert_eq!(ctx.value("site_url"), Some("https://nstcg.org"));
    }

    #[tokio::test]
    async fn test_run_context_without_api_uses_fallback() {
        let now = DateTime::parse_from_rfc3339("2025-06-30T08:00:00+00:00").unwrap();
        let ctx = run_context(&TemplateConfig::default(), now).await;
        assert_eq!(ctx.live_count, Some(555));
    }
}
