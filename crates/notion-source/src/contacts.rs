//! Campaign recipients from the signups database

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use campaign_core::{Contact, Page, PagedSource, SourceError};

use crate::client::{required, NotionClient, NotionError, NotionPage};

/// Property names in the signups database
mod props {
    pub const EMAIL: &str = "Email";
    pub const FIRST_NAME: &str = "First Name";
    pub const LAST_NAME: &str = "Last Name";
    pub const NAME: &str = "Name";
    pub const REFERRAL_CODE: &str = "Referral Code";
}

/// Reads contacts with a non-empty `Email` property
pub struct NotionContactSource {
    client: NotionClient,
    database_id: String,
    filter: Value,
}

impl NotionContactSource {
    pub fn new(client: NotionClient, database_id: impl Into<String>) -> Self {
        Self {
            client,
            database_id: database_id.into(),
            filter: json!({
                "property": props::EMAIL,
                "email": { "is_not_empty": true }
            }),
        }
    }

    /// `NOTION_TOKEN` and `NOTION_DATABASE_ID` from the environment
    pub fn from_env() -> Result<Self, NotionError> {
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: &F) -> Result<Self, NotionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let client = NotionClient::from_lookup(lookup)?;
        let database_id = required(lookup, "NOTION_DATABASE_ID")?;
        Ok(Self::new(client, database_id))
    }
}

#[async_trait]
impl PagedSource for NotionContactSource {
    type Item = Contact;

    async fn fetch_page(
        &self,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<Page<Contact>, SourceError> {
        let response = self
            .client
            .query_database(&self.database_id, cursor, page_size, Some(&self.filter))
            .await?;

        let items = response.results.iter().filter_map(contact_from_page).collect();
        Ok(Page {
            items,
            has_more: response.has_more,
            next_cursor: response.next_cursor,
        })
    }
}

/// Map a signup page to a contact; pages without an email are skipped.
///
/// Contacts without a stored referral code get a freshly generated one so
/// every rendered email carries working share links.
pub fn contact_from_page(page: &NotionPage) -> Option<Contact> {
    let email = page
        .property(props::EMAIL)
        .and_then(|p| p.email.as_deref())
        .map(str::trim)
        .filter(|e| !e.is_empty())?;

    let mut contact = Contact::builder(email)
        .id(page.id.as_str())
        .first_name(page.text(props::FIRST_NAME))
        .last_name(page.text(props::LAST_NAME))
        .display_name(page.text(props::NAME))
        .referral_code(page.text(props::REFERRAL_CODE))
        .build();

    if contact.referral_code.is_none() {
        let code = generate_referral_code(&contact.first_name);
        debug!(email = %contact.email, %code, "Generated referral code");
        contact.referral_code = Some(code);
    }
    Some(contact)
}

/// Three-letter name prefix (or `USR`) plus eight random characters
pub fn generate_referral_code(first_name: &str) -> String {
    let prefix: String = first_name
        .chars()
        .filter(|c| c.is_alphanumeric())
        .take(3)
        .collect::<String>()
        .to_uppercase();
    let prefix = if prefix.is_empty() { "USR".to_string() } else { prefix };

    let suffix = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
    format!("{prefix}{}", &suffix[..8])
}
