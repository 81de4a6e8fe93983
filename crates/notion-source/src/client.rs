//! Minimal Notion API client: database queries only

use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use campaign_core::SourceError;

/// Notion API base URL
pub const NOTION_API_URL: &str = "https://api.notion.com/v1";

/// API version sent in the `Notion-Version` header
pub const NOTION_VERSION: &str = "2022-06-28";

#[derive(Debug, thiserror::Error)]
pub enum NotionError {
    #[error("{0} is not set")]
    MissingCredentials(String),

    #[error("request to Notion failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notion API error ({status} {code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("unexpected Notion response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<NotionError> for SourceError {
    fn from(err: NotionError) -> Self {
        match err {
            NotionError::MissingCredentials(var) => {
                SourceError::MissingCredentials(format!("{var} is not set"))
            }
            NotionError::Http(e) => SourceError::Unreachable(e.to_string()),
            NotionError::Api {
                status,
                code,
                message,
            } => SourceError::Rejected {
                status,
                message: format!("{code}: {message}"),
            },
            NotionError::Decode(e) => SourceError::Malformed(e.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Response of `POST /databases/{id}/query`
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub results: Vec<NotionPage>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotionPage {
    pub id: String,
    #[serde(default)]
    pub properties: HashMap<String, PropertyValue>,
}

impl NotionPage {
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Text of a title or rich_text property, trimmed; empty if absent
    pub fn text(&self, name: &str) -> String {
        self.property(name)
            .map(|p| p.text().trim().to_string())
            .unwrap_or_default()
    }
}

/// A page property value.
///
/// Notion tags each value with its `type` and stores the payload under a key
/// of the same name; only the payloads this crate reads are modelled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertyValue {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub title: Vec<RichText>,
    #[serde(default)]
    pub rich_text: Vec<RichText>,
    #[serde(default)]
    pub number: Option<f64>,
    #[serde(default)]
    pub date: Option<DateValue>,
}

impl PropertyValue {
    /// Concatenated text of the title or rich_text segments
    pub fn text(&self) -> String {
        let segments = if self.title.is_empty() {
            &self.rich_text
        } else {
            &self.title
        };
        segments.iter().map(RichText::content).collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RichText {
    #[serde(default)]
    pub plain_text: Option<String>,
    #[serde(default)]
    pub text: Option<TextContent>,
}

impl RichText {
    pub fn content(&self) -> &str {
        self.plain_text
            .as_deref()
            .or_else(|| self.text.as_ref().map(|t| t.content.as_str()))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextContent {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DateValue {
    pub start: Option<String>,
}

pub struct NotionClient {
    http: reqwest::Client,
    token: String,
    base_url: String,
}

impl NotionClient {
    pub fn new(token: impl Into<String>) -> Result<Self, NotionError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            token: token.into(),
            base_url: NOTION_API_URL.to_string(),
        })
    }

    /// Read `NOTION_TOKEN` through `lookup`
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, NotionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = required(lookup, "NOTION_TOKEN")?;
        Self::new(token)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Run one page of a database query
    #[instrument(skip(self, filter), fields(database = %database_id))]
    pub async fn query_database(
        &self,
        database_id: &str,
        cursor: Option<&str>,
        page_size: u32,
        filter: Option<&Value>,
    ) -> Result<QueryResponse, NotionError> {
        let mut body = json!({ "page_size": page_size });
        if let Some(cursor) = cursor {
            body["start_cursor"] = json!(cursor);
        }
        if let Some(filter) = filter {
            body["filter"] = filter.clone();
        }

        let url = format!(
            "{}/databases/{}/query",
            self.base_url.trim_end_matches('/'),
            database_id
        );
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;
        if !(200..300).contains(&status) {
            let (code, message) = match serde_json::from_str::<ApiErrorBody>(&text) {
                Ok(err) => (err.code, err.message),
                Err(_) => ("unknown".to_string(), text.trim().to_string()),
            };
            warn!(status, %code, "Notion query failed");
            return Err(NotionError::Api {
                status,
                code,
                message,
            });
        }

        let page: QueryResponse = serde_json::from_str(&text)?;
        debug!(results = page.results.len(), has_more = page.has_more, "Notion page fetched");
        Ok(page)
    }
}

/// A non-empty environment value, or `MissingCredentials`
pub(crate) fn required<F>(lookup: &F, key: &str) -> Result<String, NotionError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| NotionError::MissingCredentials(key.to_string()))
}

/// Parse a Notion date (`2025-06-30` or full RFC 3339) as UTC
pub fn parse_date(value: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    use chrono::{DateTime, NaiveDate, Utc};

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
