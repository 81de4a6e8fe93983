//! Resend HTTP API transport
//!
//! Single sends go to `POST /emails`; batches go to `POST /emails/batch`,
//! which accepts up to 100 messages and answers with one id per message in
//! submission order.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use campaign_core::{
    DeliveryReceipt, OutboundEmail, RecipientOutcome, Transport, TransportError,
};

use crate::validate::check_recipient;

/// Resend API base URL
pub const RESEND_API_URL: &str = "https://api.resend.com";

/// Largest batch the Resend batch endpoint accepts
pub const MAX_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct ResendConfig {
    /// Resend API key (re_xxxxxxxxxx)
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl ResendConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: RESEND_API_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Read `RESEND_API_KEY` (and optionally `RESEND_API_URL`) from the environment
    pub fn from_env() -> Result<Self, TransportError> {
        let api_key = std::env::var("RESEND_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| TransportError::Config("RESEND_API_KEY is not set".into()))?;
        let mut config = Self::new(api_key);
        if let Ok(url) = std::env::var("RESEND_API_URL") {
            config.base_url = url;
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Resend API request payload
#[derive(Debug, Serialize)]
struct ResendPayload<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
}

impl<'a> From<&'a OutboundEmail> for ResendPayload<'a> {
    fn from(email: &'a OutboundEmail) -> Self {
        Self {
            from: &email.from,
            to: [&email.to],
            subject: &email.subject,
            html: &email.html,
            reply_to: email.reply_to.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResendSuccessResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ResendBatchResponse {
    #[serde(default)]
    data: Vec<ResendSuccessResponse>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct ResendErrorResponse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    statusCode: Option<u16>,
}

/// Map a non-success response to a transport error
fn error_from_response(status: u16, body: &str) -> TransportError {
    let message = match serde_json::from_str::<ResendErrorResponse>(body) {
        Ok(err) => err
            .message
            .or(err.name)
            .unwrap_or_else(|| format!("HTTP {}", err.statusCode.unwrap_or(status))),
        Err(_) if body.trim().is_empty() => format!("HTTP {status}"),
        Err(_) => format!("HTTP {status}: {}", body.trim()),
    };

    match status {
        401 | 403 => TransportError::Unauthorized(message),
        429 => TransportError::RateLimited(message),
        500..=599 => TransportError::Rejected {
            status,
            message: format!("email service temporarily unavailable: {message}"),
        },
        _ => TransportError::Rejected { status, message },
    }
}

fn network_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Network(format!("request timed out: {err}"))
    } else {
        TransportError::Network(err.to_string())
    }
}

pub struct ResendTransport {
    client: reqwest::Client,
    config: ResendConfig,
}

impl ResendTransport {
    pub fn new(config: ResendConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::Config(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self, TransportError> {
        Self::new(ResendConfig::from_env()?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<String, TransportError> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(network_error)?;
        if (200..300).contains(&status) {
            Ok(text)
        } else {
            warn!(status, body = %text, "Resend returned an error");
            Err(error_from_response(status, &text))
        }
    }

    /// Submit one chunk of at most `MAX_BATCH_SIZE` valid messages
    async fn send_chunk(
        &self,
        emails: &[&OutboundEmail],
    ) -> Result<Vec<RecipientOutcome>, TransportError> {
        let payload: Vec<ResendPayload<'_>> = emails.iter().map(|e| ResendPayload::from(*e)).collect();
        let body = self.post("/emails/batch", &payload).await?;

        let ids = match serde_json::from_str::<ResendBatchResponse>(&body) {
            Ok(parsed) => parsed.data,
            Err(e) => {
                // Accepted, but the ids are unreadable
                warn!(error = %e, "Could not parse Resend batch response");
                return Ok(emails
                    .iter()
                    .map(|e| RecipientOutcome::sent(&e.to, None))
                    .collect());
            }
        };

        let mut ids = ids.into_iter();
        Ok(emails
            .iter()
            .map(|email| match ids.next() {
                Some(ok) => RecipientOutcome::sent(&email.to, Some(ok.id)),
                None => RecipientOutcome::failed(&email.to, "no id returned for message"),
            })
            .collect())
    }
}

#[async_trait]
impl Transport for ResendTransport {
    fn name(&self) -> &'static str {
        "resend"
    }

    #[instrument(skip(self, email), fields(to = %email.to, subject = %email.subject))]
    async fn send(&self, email: &OutboundEmail) -> Result<DeliveryReceipt, TransportError> {
        check_recipient(&email.to)?;

        let body = self.post("/emails", &ResendPayload::from(email)).await?;
        let receipt = match serde_json::from_str::<ResendSuccessResponse>(&body) {
            Ok(ok) => DeliveryReceipt::with_id(ok.id),
            Err(e) => {
                warn!(error = %e, "Could not parse Resend response");
                DeliveryReceipt::default()
            }
        };
        debug!(message_id = ?receipt.message_id, "Email sent via Resend");
        Ok(receipt)
    }

    #[instrument(skip(self, emails), fields(size = emails.len()))]
    async fn send_batch(
        &self,
        emails: &[OutboundEmail],
    ) -> Result<Vec<RecipientOutcome>, TransportError> {
        // An invalid address makes Resend reject the whole batch, so those are
        // failed individually and left out of the request.
        let mut outcomes = Vec::with_capacity(emails.len());
        let mut valid = Vec::with_capacity(emails.len());
        for email in emails {
            match check_recipient(&email.to) {
                Ok(()) => valid.push(email),
                Err(e) => outcomes.push(RecipientOutcome::failed(&email.to, e.to_string())),
            }
        }

        if valid.len() <= MAX_BATCH_SIZE {
            if !valid.is_empty() {
                outcomes.extend(self.send_chunk(&valid).await?);
            }
        } else {
            // Earlier chunks may already be delivered, so a failing chunk
            // only fails its own members.
            for chunk in valid.chunks(MAX_BATCH_SIZE) {
                match self.send_chunk(chunk).await {
                    Ok(chunk_outcomes) => outcomes.extend(chunk_outcomes),
                    Err(e) => {
                        warn!(error = %e, size = chunk.len(), "Resend batch chunk failed");
                        let reason = e.to_string();
                        outcomes.extend(
                            chunk
                                .iter()
                                .map(|email| RecipientOutcome::failed(&email.to, reason.clone())),
                        );
                    }
                }
            }
        }

        info!(
            submitted = valid.len(),
            rejected_locally = emails.len() - valid.len(),
            "Batch sent via Resend"
        );
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn email() -> OutboundEmail {
        OutboundEmail::new(
            "Campaign <campaign@example.org>",
            "recipient@example.com",
            "Test Subject",
            "<p>Hello</p>",
        )
    }

    #[test]
    fn test_resend_payload_serialization() {
        let email = email();
        let json = serde_json::to_string(&ResendPayload::from(&email)).unwrap();
        assert_eq!(
            json,
            r#"{"from":"Campaign <campaign@example.org>","to":["recipient@example.com"],"subject":"Test Subject","html":"<p>Hello</p>"}"#
        );
    }

    #[test]
    fn test_resend_payload_with_reply_to() {
        let email = email().with_reply_to("reply@example.org");
        let json = serde_json::to_string(&ResendPayload::from(&email)).unwrap();
        assert!(json.contains("\"reply_to\":\"reply@example.org\""));
    }

    #[test]
    fn test_resend_error_response_parsing() {
        let error_json =
            r#"{"statusCode":422,"message":"Invalid email address","name":"validation_error"}"#;
        let error: ResendErrorResponse = serde_json::from_str(error_json).unwrap();
        assert_eq!(error.statusCode, Some(422));
        assert_eq!(error.message.as_deref(), Some("Invalid email address"));
        assert_eq!(error.name.as_deref(), Some("validation_error"));
    }

    #[test]
    fn test_error_mapping() {
        assert!(matches!(
            error_from_response(401, r#"{"message":"API key is invalid"}"#),
            TransportError::Unauthorized(m) if m == "API key is invalid"
        ));
        assert!(matches!(
            error_from_response(429, ""),
            TransportError::RateLimited(m) if m == "HTTP 429"
        ));
        assert!(matches!(
            error_from_response(422, r#"{"name":"validation_error"}"#),
            TransportError::Rejected { status: 422, message } if message == "validation_error"
        ));
        assert!(matches!(
            error_from_response(502, "Bad Gateway"),
            TransportError::Rejected { status: 502, message }
                if message == "email service temporarily unavailable: HTTP 502: Bad Gateway"
        ));
    }

    #[test]
    fn test_url_joins_base() {
        let transport =
            ResendTransport::new(ResendConfig::new("re_test").with_base_url("http://localhost:1/"))
                .unwrap();
        assert_eq!(transport.url("/emails"), "http://localhost:1/emails");
    }
}
