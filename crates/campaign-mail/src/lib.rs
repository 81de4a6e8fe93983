//! Campaign mail - transports for delivering campaign messages
//!
//! - [`ResendTransport`]: Resend HTTP API with native batch sends
//! - [`SmtpTransport`]: any SMTP relay via lettre
//! - [`Throttled`]: governor-backed rate limit around either
//!
//! All of them implement [`campaign_core::Transport`].

pub mod resend;
pub mod smtp;
pub mod throttle;
pub mod validate;

use std::str::FromStr;

use campaign_core::{Transport, TransportError};

pub use resend::{ResendConfig, ResendTransport};
pub use smtp::{SmtpConfig, SmtpSecurity, SmtpTransport};
pub use throttle::{MaybeThrottled, Throttled};

/// Which provider to deliver through
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransportKind {
    #[default]
    Resend,
    Smtp,
}

impl FromStr for TransportKind {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "resend" => Ok(TransportKind::Resend),
            "smtp" => Ok(TransportKind::Smtp),
            other => Err(TransportError::Config(format!("unknown transport '{other}'"))),
        }
    }
}

/// Build the selected transport from environment credentials, rate limited
/// when `max_per_second` is set.
pub fn transport_from_env(
    kind: TransportKind,
    max_per_second: Option<u32>,
) -> Result<MaybeThrottled<Box<dyn Transport>>, TransportError> {
    let transport: Box<dyn Transport> = match kind {
        TransportKind::Resend => Box::new(ResendTransport::from_env()?),
        TransportKind::Smtp => Box::new(SmtpTransport::new(&SmtpConfig::from_env()?)?),
    };
    Ok(Throttled::maybe(transport, max_per_second))
}
