//! Recipient address checks run before handing a message to a provider

use email_address::EmailAddress;
use std::str::FromStr;

use campaign_core::TransportError;

/// Reject addresses the provider would refuse outright
pub fn check_recipient(address: &str) -> Result<(), TransportError> {
    EmailAddress::from_str(address.trim())
        .map(|_| ())
        .map_err(|e| TransportError::InvalidMessage(format!("invalid recipient '{address}': {e}")))
}
