//! Open-tracking records from the email analytics database

use async_trait::async_trait;

use campaign_core::{normalize_email, Page, PagedSource, SourceError, TrackingRecord};

use crate::client::{parse_date, required, NotionClient, NotionError, NotionPage};

const UNKNOWN_COUNTRY: &str = "Unknown";

pub struct NotionTrackingSource {
    client: NotionClient,
    database_id: String,
}

impl NotionTrackingSource {
    pub fn new(client: NotionClient, database_id: impl Into<String>) -> Self {
        Self {
            client,
            database_id: database_id.into(),
        }
    }

    /// `NOTION_TOKEN` and `NOTION_EMAIL_ANALYTICS_DB_ID` from the environment
    pub fn from_env() -> Result<Self, NotionError> {
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: &F) -> Result<Self, NotionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let client = NotionClient::from_lookup(lookup)?;
        let database_id = required(lookup, "NOTION_EMAIL_ANALYTICS_DB_ID")?;
        Ok(Self::new(client, database_id))
    }
}

#[async_trait]
impl PagedSource for NotionTrackingSource {
    type Item = TrackingRecord;

    async fn fetch_page(
        &self,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<Page<TrackingRecord>, SourceError> {
        let response = self
            .client
            .query_database(&self.database_id, cursor, page_size, None)
            .await?;

        Ok(Page {
            items: response.results.iter().filter_map(record_from_page).collect(),
            has_more: response.has_more,
            next_cursor: response.next_cursor,
        })
    }
}

/// Map an analytics page to a record; pages without an email are skipped
pub fn record_from_page(page: &NotionPage) -> Option<TrackingRecord> {
    // Email is the title column here, not an email property
    let email = page.text("Email");
    if email.is_empty() {
        return None;
    }

    let date = |name: &str| {
        page.property(name)
            .and_then(|p| p.date.as_ref())
            .and_then(|d| d.start.as_deref())
            .and_then(parse_date)
    };
    let open_count = page
        .property("Open Count")
        .and_then(|p| p.number)
        .filter(|n| n.is_finite() && *n > 0.0)
        .map(|n| n as u64)
        .unwrap_or(0);
    let country = page.text("Country");

    Some(TrackingRecord {
        email: normalize_email(&email),
        campaign: page.text("Campaign ID"),
        open_count,
        first_opened: date("First Opened"),
        last_opened: date("Last Opened"),
        country: if country.is_empty() {
            UNKNOWN_COUNTRY.to_string()
        } else {
            country
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn page(value: serde_json::Value) -> NotionPage {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_full_record() {
        let record = record_from_page(&page(json!({
            "id": "t1",
            "properties": {
                "Email": { "type": "title", "title": [{ "plain_text": "Reader@Example.org" }] },
                "Campaign ID": { "type": "rich_text", "rich_text": [{ "plain_text": "encourage-2025" }] },
                "Open Count": { "type": "number", "number": 3 },
                "First Opened": { "type": "date", "date": { "start": "2025-06-30T08:00:00.000Z" } },
                "Last Opened": { "type": "date", "date": { "start": "2025-06-30T21:30:00.000Z" } },
                "Country": { "type": "rich_text", "rich_text": [{ "plain_text": "United Kingdom" }] }
            }
        })))
        .unwrap();

        assert_eq!(record.email, "reader@example.org");
        assert_eq!(record.campaign, "encourage-2025");
        assert_eq!(record.open_count, 3);
        assert_eq!(
            record.last_opened.unwrap().to_rfc3339(),
            "2025-06-30T21:30:00+00:00"
        );
        assert_eq!(record.country, "United Kingdom");
    }

    #[test]
    fn test_defaults_for_sparse_record() {
        let record = record_from_page(&page(json!({
            "id": "t2",
            "properties": {
                "Email": { "type": "title", "title": [{ "plain_text": "a@x.org" }] },
                "Open Count": { "type": "number", "number": null }
            }
        })))
        .unwrap();

        assert_eq!(record.open_count, 0);
        assert_eq!(record.campaign, "");
        assert_eq!(record.country, "Unknown");
        assert!(record.first_opened.is_none());
    }

    #[test]
    fn test_record_without_email_is_skipped() {
        let result = record_from_page(&page(json!({
            "id": "t3",
            "properties": { "Email": { "type": "title", "title": [] } }
        })));
        assert!(result.is_none());
    }
}
