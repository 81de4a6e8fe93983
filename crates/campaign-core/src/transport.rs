//! Transport seam: hand rendered messages to an email provider

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::contact::normalize_email;

/// A fully rendered message ready for delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl OutboundEmail {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        html: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            subject: subject.into(),
            html: html.into(),
            reply_to: None,
        }
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }
}

/// Provider acknowledgement of a delivered message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub message_id: Option<String>,
}

impl DeliveryReceipt {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            message_id: Some(id.into()),
        }
    }
}

/// Outcome for one recipient of a batch send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent { message_id: Option<String> },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientOutcome {
    pub recipient: String,
    #[serde(flatten)]
    pub status: DeliveryStatus,
}

impl RecipientOutcome {
    pub fn sent(recipient: impl AsRef<str>, message_id: Option<String>) -> Self {
        Self {
            recipient: normalize_email(recipient.as_ref()),
            status: DeliveryStatus::Sent { message_id },
        }
    }

    pub fn failed(recipient: impl AsRef<str>, reason: impl Into<String>) -> Self {
        Self {
            recipient: normalize_email(recipient.as_ref()),
            status: DeliveryStatus::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self.status, DeliveryStatus::Sent { .. })
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    #[error("Rejected by provider ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Transport misconfigured: {0}")]
    Config(String),
}

/// Delivers rendered messages.
///
/// `send_batch` defaults to one `send` per message; providers with a native
/// batch endpoint override it. An `Err` from `send_batch` means the whole
/// call failed and no recipient should be considered delivered.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &'static str;

    async fn send(&self, email: &OutboundEmail) -> Result<DeliveryReceipt, TransportError>;

    async fn send_batch(
        &self,
        emails: &[OutboundEmail],
    ) -> Result<Vec<RecipientOutcome>, TransportError> {
        let mut outcomes = Vec::with_capacity(emails.len());
        for email in emails {
            let outcome = match self.send(email).await {
                Ok(receipt) => RecipientOutcome::sent(&email.to, receipt.message_id),
                Err(e) => RecipientOutcome::failed(&email.to, e.to_string()),
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn send(&self, email: &OutboundEmail) -> Result<DeliveryReceipt, TransportError> {
        (**self).send(email).await
    }

    async fn send_batch(
        &self,
        emails: &[OutboundEmail],
    ) -> Result<Vec<RecipientOutcome>, TransportError> {
        (**self).send_batch(emails).await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn send(&self, email: &OutboundEmail) -> Result<DeliveryReceipt, TransportError> {
        (**self).send(email).await
    }

    async fn send_batch(
        &self,
        emails: &[OutboundEmail],
    ) -> Result<Vec<RecipientOutcome>, TransportError> {
        (**self).send_batch(emails).await
    }
}
