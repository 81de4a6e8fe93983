//! Test doubles shared by the controller integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use campaign_core::{
    CampaignController, Contact, DeliveryReceipt, DeliverySettings, LedgerStore, OutboundEmail,
    RecipientOutcome, RenderContext, RenderError, Renderer, StopSignal, Transport, TransportError,
};

pub fn contacts(emails: &[&str]) -> Vec<Contact> {
    emails.iter().map(Contact::new).collect()
}

pub fn settings(batch_size: usize) -> DeliverySettings {
    DeliverySettings {
        from: "Campaign <campaign@example.org>".into(),
        reply_to: None,
        subject: "Have your say".into(),
        batch_size,
        send_delay: Duration::ZERO,
        batch_delay: Duration::ZERO,
        render_workers: 4,
    }
}

/// Renders `<p>Hi {first_name}</p>`, failing for addresses starting with `bad`
/// and panicking for addresses starting with `panic`
#[derive(Default)]
pub struct FakeRenderer {
    pub calls: AtomicUsize,
}

impl FakeRenderer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Renderer for FakeRenderer {
    fn render(&self, contact: &Contact, _ctx: &RenderContext) -> Result<String, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if contact.email.starts_with("panic") {
            panic!("renderer crashed on {}", contact.email);
        }
        if contact.email.starts_with("bad") {
            return Err(RenderError::MissingField {
                email: contact.email.clone(),
                field: "referral code".into(),
            });
        }
        Ok(format!("<p>Hi {}</p>", contact.first_name))
    }
}

/// How the fake answers a batch call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchBehaviour {
    #[default]
    InOrder,
    Reversed,
    /// Every batch call fails outright
    Fail,
    /// Only the first batch call fails outright
    FailFirst,
}

#[derive(Default)]
pub struct FakeTransport {
    pub bounce: HashSet<String>,
    /// Recipients the fake leaves out of batch results
    pub omit: HashSet<String>,
    pub batch: BatchBehaviour,
    /// Stop this signal once this many single sends have happened
    pub stop_after: Option<(usize, StopSignal)>,
    /// Stop this signal during this batch call (1-based)
    pub stop_during_batch: Option<(usize, StopSignal)>,
    pub sends: Mutex<Vec<String>>,
    pub batches: Mutex<Vec<Vec<String>>>,
}

impl FakeTransport {
    pub fn bouncing(emails: &[&str]) -> Self {
        Self {
            bounce: emails.iter().map(|e| e.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn sends(&self) -> Vec<String> {
        self.sends.lock().unwrap().clone()
    }

    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }

    fn bounced(&self, to: &str) -> bool {
        self.bounce.contains(to)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn send(&self, email: &OutboundEmail) -> Result<DeliveryReceipt, TransportError> {
        let count = {
            let mut sends = self.sends.lock().unwrap();
            sends.push(email.to.clone());
            sends.len()
        };
        if let Some((after, signal)) = &self.stop_after {
            if count >= *after {
                signal.stop();
            }
        }

        if self.bounced(&email.to) {
            Err(TransportError::Rejected {
                status: 422,
                message: format!("{} bounced", email.to),
            })
        } else {
            Ok(DeliveryReceipt::with_id(format!("msg-{count}")))
        }
    }

    async fn send_batch(
        &self,
        emails: &[OutboundEmail],
    ) -> Result<Vec<RecipientOutcome>, TransportError> {
        let number = {
            let mut batches = self.batches.lock().unwrap();
            batches.push(emails.iter().map(|e| e.to.clone()).collect());
            batches.len()
        };
        if let Some((at, signal)) = &self.stop_during_batch {
            if number == *at {
                signal.stop();
            }
        }

        match self.batch {
            BatchBehaviour::Fail => {
                return Err(TransportError::Network("connection reset".into()));
            }
            BatchBehaviour::FailFirst if number == 1 => {
                return Err(TransportError::Network("connection reset".into()));
            }
            _ => {}
        }

        let mut outcomes: Vec<RecipientOutcome> = emails
            .iter()
            .filter(|e| !self.omit.contains(&e.to))
            .map(|e| {
                if self.bounced(&e.to) {
                    RecipientOutcome::failed(&e.to, "Mailbox does not exist")
                } else {
                    RecipientOutcome::sent(&e.to, Some(format!("id-{}", e.to)))
                }
            })
            .collect();
        if self.batch == BatchBehaviour::Reversed {
            outcomes.reverse();
        }
        Ok(outcomes)
    }
}

/// Controller with the given pauses between sends and between batches
pub fn paced_controller(
    dir: &std::path::Path,
    batch_size: usize,
    send_delay: Duration,
    batch_delay: Duration,
    transport: Arc<FakeTransport>,
) -> CampaignController<FakeRenderer, Arc<FakeTransport>> {
    let mut delivery = settings(batch_size);
    delivery.send_delay = send_delay;
    delivery.batch_delay = batch_delay;
    CampaignController::new(
        delivery,
        LedgerStore::new(dir),
        Arc::new(FakeRenderer::default()),
        transport,
    )
}

pub fn controller(
    dir: &std::path::Path,
    batch_size: usize,
    renderer: Arc<FakeRenderer>,
    transport: Arc<FakeTransport>,
) -> CampaignController<FakeRenderer, Arc<FakeTransport>> {
    CampaignController::new(settings(batch_size), LedgerStore::new(dir), renderer, transport)
}
