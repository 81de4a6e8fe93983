//! Preview command - render one contact's email without sending it

use anyhow::{Context, Result};
use chrono::Local;
use clap::Args;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use campaign_core::source::DEFAULT_PAGE_SIZE;
use campaign_core::{fetch_all, normalize_email, Contact, Renderer};
use campaign_templates::{run_context, TemplateRenderer};
use notion_source::{generate_referral_code, NotionContactSource};

use crate::settings::{self, Overrides};

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// Render for this contact from the contact list (default: a sample contact)
    #[arg(long)]
    pub email: Option<String>,

    /// Where to write the rendered HTML
    #[arg(long, short = 'o', default_value = "preview.html")]
    pub output: PathBuf,
}

/// Placeholder recipient used when no address is given
pub fn sample_contact() -> Contact {
    Contact::builder("preview@example.org")
        .first_name("Friend")
        .display_name("Friend of Shore Road")
        .referral_code(generate_referral_code("Friend"))
        .build()
}

async fn find_contact(email: &str) -> Result<Contact> {
    let source =
        NotionContactSource::from_env().context("Notion contact source is not configured")?;
    let wanted = normalize_email(email);
    fetch_all(&source, DEFAULT_PAGE_SIZE)
        .await
        .context("Failed to fetch contacts")?
        .into_iter()
        .find(|c| c.email == wanted)
        .with_context(|| format!("{wanted} is not in the contact list"))
}

pub async fn execute(args: PreviewArgs, config_path: Option<&Path>) -> Result<()> {
    let config = settings::load(config_path, &Overrides::default())?;
    let renderer = TemplateRenderer::from_config(&config.template)
        .context("Failed to load email template")?;

    let contact = match &args.email {
        Some(email) => find_contact(email).await?,
        None => sample_contact(),
    };

    let context = run_context(&config.template, Local::now().fixed_offset()).await;
    let html = renderer
        .render(&contact, &context)
        .with_context(|| format!("Failed to render email for {}", contact.email))?;

    fs::write(&args.output, &html)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    info!(
        email = %contact.email,
        bytes = html.len(),
        path = %args.output.display(),
        "Preview written"
    );
    println!("{}", args.output.display());
    Ok(())
}
