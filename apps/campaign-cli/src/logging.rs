//! Tracing setup. Logs go to stderr so stdout carries only reports.

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "campaign=info,campaign_cli=info,campaign_core=info,\
campaign_mail=info,campaign_templates=info,notion_source=info";

pub fn init(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_current_span(false)
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_target(false)
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
