//! Campaign core - resumable email campaigns with durable send ledgers
//!
//! This crate turns a contact list into a deduplicated, resumable,
//! rate-limited delivery run:
//!
//! ```text
//! ContactSource → filter (sent ledger) → Renderer → Transport → LedgerStore
//!                                                                  ↓
//!                                                              RunSummary
//! ```
//!
//! ## Guarantees
//!
//! - **Idempotent resume**: contacts already in the sent ledger are never
//!   attempted again, so an interrupted run is resumed by running it again.
//! - **At-most-once**: the sent ledger is persisted after every message
//!   (sequential mode) or every batch (batched mode) before more work starts.
//! - **Failure isolation**: render and transport failures for one contact are
//!   written to the failed ledger and never stop the run.
//! - **Dry runs are pure**: no ledger writes, no renders, no sends.
//!
//! The source, renderer and transport are traits; concrete implementations
//! live in `notion-source`, `campaign-templates` and `campaign-mail`.

pub mod batch;
pub mod config;
pub mod contact;
pub mod controller;
pub mod error;
pub mod ledger;
pub mod render;
pub mod reporter;
pub mod signal;
pub mod source;
pub mod summary;
pub mod tracking;
pub mod transport;

pub use config::{
    CampaignConfig, ConfigError, DeliveryConfig, LedgerConfig, MessageConfig, SendMode,
    TemplateConfig,
};
pub use contact::{normalize_email, Contact, ContactBuilder};
pub use controller::{filter_pending, CampaignController, DeliverySettings, RunOptions, RunPhase};
pub use error::CampaignError;
pub use ledger::{FailedEntry, LedgerError, LedgerKind, LedgerStore};
pub use render::{RenderContext, RenderError, Renderer};
pub use signal::StopSignal;
pub use source::{fetch_all, ContactSource, Page, PagedSource, SourceError, TrackingSource};
pub use summary::{RunOutcome, RunSummary};
pub use tracking::{TrackingRecord, TrackingReport};
pub use transport::{
    DeliveryReceipt, DeliveryStatus, OutboundEmail, RecipientOutcome, Transport, TransportError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
