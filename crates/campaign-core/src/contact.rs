//! Contact records fetched from the campaign's source database

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single recipient of a campaign.
///
/// The email address is the unique key and is always stored trimmed and
/// lower-cased, so every comparison against the sent ledger is
/// case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Upstream record identifier
    #[serde(default)]
    pub id: String,

    /// Normalized recipient address
    #[serde(deserialize_with = "deserialize_email")]
    pub email: String,

    #[serde(default)]
    pub first_name: String,

    #[serde(default)]
    pub last_name: String,

    /// Name used in greetings
    #[serde(default, alias = "name")]
    pub display_name: String,

    /// Referral code embedded in share links
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral_code: Option<String>,

    /// Other campaign-specific fields (tracking id, source, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

impl Contact {
    /// Build a contact from an address, deriving every name from its local part.
    pub fn new(email: impl AsRef<str>) -> Self {
        Self::builder(email).build()
    }

    /// Start building a contact for the given address
    pub fn builder(email: impl AsRef<str>) -> ContactBuilder {
        ContactBuilder {
            email: normalize_email(email.as_ref()),
            ..ContactBuilder::default()
        }
    }

    /// Local part of the address, used as a last-resort name
    pub fn local_part(&self) -> &str {
        self.email.split('@').next().unwrap_or(&self.email)
    }

    /// Look up an extra field by name
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Builder applying the name fallback chain:
/// explicit name, then `first last`, then the local part of the address.
#[derive(Debug, Default)]
pub struct ContactBuilder {
    id: String,
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    display_name: Option<String>,
    referral_code: Option<String>,
    fields: BTreeMap<String, String>,
}

impl ContactBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn first_name(mut self, name: impl Into<String>) -> Self {
        self.first_name = non_empty(name.into());
        self
    }

    pub fn last_name(mut self, name: impl Into<String>) -> Self {
        self.last_name = non_empty(name.into());
        self
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = non_empty(name.into());
        self
    }

    pub fn referral_code(mut self, code: impl Into<String>) -> Self {
        self.referral_code = non_empty(code.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Contact {
        let local = self.email.split('@').next().unwrap_or_default().to_string();
        let first = self.first_name.clone().unwrap_or_default();
        let last = self.last_name.clone().unwrap_or_default();

        let display_name = self
            .display_name
            .or_else(|| non_empty(format!("{} {}", first, last)))
            .unwrap_or_else(|| local.clone());

        let first_name = self
            .first_name
            .or_else(|| display_name.split_whitespace().next().map(str::to_string))
            .unwrap_or(local);

        Contact {
            id: self.id,
            email: self.email,
            first_name,
            last_name: last,
            display_name,
            referral_code: self.referral_code,
            fields: self.fields,
        }
    }
}

/// Trim and lower-case an address for use as a ledger key
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn deserialize_email<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(normalize_email(&raw))
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_email_is_normalized() {
        let contact = Contact::new("  Alice@Example.COM ");
        assert_eq!(contact.email, "alice@example.com");
    }

    #[test]
    fn test_display_name_prefers_explicit_name() {
        let contact = Contact::builder("a@x.org")
            .first_name("Alice")
            .last_name("Smith")
            .display_name("Ally")
            .build();
        assert_eq!(contact.display_name, "Ally");
        assert_eq!(contact.first_name, "Alice");
    }

    #[test]
    fn test_display_name_falls_back_to_first_and_last() {
        let contact = Contact::builder("a@x.org")
            .first_name("Alice")
            .last_name("Smith")
            .build();
        assert_eq!(contact.display_name, "Alice Smith");
    }

    #[test]
    fn test_display_name_with_only_last_name() {
        let contact = Contact::builder("a@x.org").last_name("Smith").build();
        assert_eq!(contact.display_name, "Smith");
        assert_eq!(contact.first_name, "Smith");
    }

    #[test]
    fn test_names_fall_back_to_local_part() {
        let contact = Contact::new("jo.bloggs@x.org");
        assert_eq!(contact.display_name, "jo.bloggs");
        assert_eq!(contact.first_name, "jo.bloggs");
        assert_eq!(contact.local_part(), "jo.bloggs");
    }

    #[test]
    fn test_blank_referral_code_is_none() {
        let contact = Contact::builder("a@x.org").referral_code("  ").build();
        assert!(contact.referral_code.is_none());
    }

    #[test]
    fn test_serde_accepts_name_alias() {
        let json = r#"{"email":"a@x.org","name":"Alice"}"#;
        let contact: Contact = serde_json::from_str(json).unwrap();
        assert_eq!(contact.display_name, "Alice");
    }

    #[test]
    fn test_serde_normalizes_email() {
        let json = r#"{"email":" Bob@X.org"}"#;
        let contact: Contact = serde_json::from_str(json).unwrap();
        assert_eq!(contact.email, "bob@x.org");
    }

    #[test]
    fn test_serde_camel_case() {
        let contact = Contact::builder("a@x.org")
            .first_name("Alice")
            .referral_code("ALIABCDEFGH")
            .build();
        let json = serde_json::to_string(&contact).unwrap();
        assert!(json.contains("\"firstName\":\"Alice\""));
        assert!(json.contains("\"referralCode\":\"ALIABCDEFGH\""));
        assert!(!json.contains("fields"));
    }
}
