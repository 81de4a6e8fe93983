//! SMTP transport over lettre
//!
//! For relays that are not Resend. There is no batch endpoint, so batches
//! fall back to one SMTP transaction per message.

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::{debug, info, instrument};

use campaign_core::{DeliveryReceipt, OutboundEmail, Transport, TransportError};

use crate::validate::check_recipient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpSecurity {
    /// Plain connection, for local test relays only
    None,
    StartTls,
    Tls,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub security: SmtpSecurity,
    pub timeout: Duration,
}

impl SmtpConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 587,
            username: None,
            password: None,
            security: SmtpSecurity::StartTls,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn security(mut self, security: SmtpSecurity) -> Self {
        self.security = security;
        self
    }

    /// Read `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `SMTP_SECURITY`
    pub fn from_env() -> Result<Self, TransportError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, TransportError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("SMTP_HOST")
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| TransportError::Config("SMTP_HOST is not set".into()))?;

        let mut config = Self::new(host);
        if let Some(port) = lookup("SMTP_PORT") {
            config.port = port
                .parse()
                .map_err(|_| TransportError::Config(format!("invalid SMTP_PORT '{port}'")))?;
        }
        if let (Some(user), Some(pass)) = (lookup("SMTP_USERNAME"), lookup("SMTP_PASSWORD")) {
            config = config.credentials(user, pass);
        }
        if let Some(security) = lookup("SMTP_SECURITY") {
            config.security = match security.to_ascii_lowercase().as_str() {
                "none" => SmtpSecurity::None,
                "starttls" => SmtpSecurity::StartTls,
                "tls" => SmtpSecurity::Tls,
                other => {
                    return Err(TransportError::Config(format!(
                        "invalid SMTP_SECURITY '{other}'"
                    )))
                }
            };
        }
        Ok(config)
    }
}

pub struct SmtpTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpTransport {
    pub fn new(config: &SmtpConfig) -> Result<Self, TransportError> {
        let builder = match config.security {
            SmtpSecurity::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            }
            SmtpSecurity::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                    .map_err(|e| TransportError::Config(e.to_string()))?
            }
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| TransportError::Config(e.to_string()))?,
        };

        let mut builder = builder.port(config.port).timeout(Some(config.timeout));
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        info!(
            host = %config.host,
            port = config.port,
            security = ?config.security,
            "SMTP transport initialized"
        );
        Ok(Self {
            transport: builder.build(),
        })
    }
}

/// Build the MIME message for an outbound email
pub fn build_message(email: &OutboundEmail) -> Result<Message, TransportError> {
    let parse = |field: &str, value: &str| {
        value
            .parse::<Mailbox>()
            .map_err(|e| TransportError::InvalidMessage(format!("invalid {field} '{value}': {e}")))
    };

    let mut builder = Message::builder()
        .from(parse("sender", &email.from)?)
        .to(parse("recipient", &email.to)?)
        .subject(email.subject.as_str())
        .header(ContentType::TEXT_HTML);
    if let Some(reply_to) = &email.reply_to {
        builder = builder.reply_to(parse("reply-to", reply_to)?);
    }

    builder
        .body(email.html.clone())
        .map_err(|e| TransportError::InvalidMessage(e.to_string()))
}

fn smtp_error(err: lettre::transport::smtp::Error) -> TransportError {
    match err.status() {
        Some(code) if err.is_permanent() => TransportError::Rejected {
            status: code.to_string().parse().unwrap_or(550),
            message: err.to_string(),
        },
        _ => TransportError::Network(err.to_string()),
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    fn name(&self) -> &'static str {
        "smtp"
    }

    #[instrument(skip(self, email), fields(to = %email.to))]
    async fn send(&self, email: &OutboundEmail) -> Result<DeliveryReceipt, TransportError> {
        check_recipient(&email.to)?;
        let message = build_message(email)?;

        let response = self.transport.send(message).await.map_err(smtp_error)?;
        let message_id = response.message().next().map(str::to_string);
        debug!(code = %response.code(), "Email sent via SMTP");
        Ok(DeliveryReceipt { message_id })
    }
}
