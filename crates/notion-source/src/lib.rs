//! Notion sources - campaign contacts and open-tracking records
//!
//! Both databases are read through cursor-paginated queries and exposed as
//! [`campaign_core::PagedSource`]s, so callers drain them with
//! [`campaign_core::fetch_all`].

pub mod client;
pub mod contacts;
pub mod tracking;

pub use client::{NotionClient, NotionError, NOTION_API_URL, NOTION_VERSION};
pub use contacts::{generate_referral_code, NotionContactSource};
pub use tracking::NotionTrackingSource;
