//! Provider rate limiting
//!
//! Wraps any transport so that calls wait for a token instead of tripping
//! the provider's own limit (Resend allows a handful of requests per
//! second). A batch call costs one token, the same as a single send.

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use tracing::debug;

use campaign_core::{DeliveryReceipt, OutboundEmail, RecipientOutcome, Transport, TransportError};

pub struct Throttled<T> {
    inner: T,
    limiter: DefaultDirectRateLimiter,
    per_second: NonZeroU32,
}

impl<T: Transport> Throttled<T> {
    pub fn new(inner: T, per_second: NonZeroU32) -> Self {
        Self {
            inner,
            limiter: RateLimiter::direct(Quota::per_second(per_second)),
            per_second,
        }
    }

    /// Wrap `inner` only when a limit is configured
    pub fn maybe(inner: T, per_second: Option<u32>) -> MaybeThrottled<T> {
        match per_second.and_then(NonZeroU32::new) {
            Some(limit) => MaybeThrottled::Limited(Self::new(inner, limit)),
            None => MaybeThrottled::Unlimited(inner),
        }
    }

    pub fn per_second(&self) -> u32 {
        self.per_second.get()
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[async_trait]
impl<T: Transport> Transport for Throttled<T> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn send(&self, email: &OutboundEmail) -> Result<DeliveryReceipt, TransportError> {
        self.limiter.until_ready().await;
        self.inner.send(email).await
    }

    async fn send_batch(
        &self,
        emails: &[OutboundEmail],
    ) -> Result<Vec<RecipientOutcome>, TransportError> {
        self.limiter.until_ready().await;
        debug!(size = emails.len(), "Rate limiter released batch");
        self.inner.send_batch(emails).await
    }
}

/// A transport that may or may not be rate limited
pub enum MaybeThrottled<T> {
    Limited(Throttled<T>),
    Unlimited(T),
}

#[async_trait]
impl<T: Transport> Transport for MaybeThrottled<T> {
    fn name(&self) -> &'static str {
        match self {
            MaybeThrottled::Limited(t) => t.name(),
            MaybeThrottled::Unlimited(t) => t.name(),
        }
    }

    async fn send(&self, email: &OutboundEmail) -> Result<DeliveryReceipt, TransportError> {
        match self {
            MaybeThrottled::Limited(t) => t.send(email).await,
            MaybeThrottled::Unlimited(t) => t.send(email).await,
        }
    }

    async fn send_batch(
        &self,
        emails: &[OutboundEmail],
    ) -> Result<Vec<RecipientOutcome>, TransportError> {
        match self {
            MaybeThrottled::Limited(t) => t.send_batch(emails).await,
            MaybeThrottled::Unlimited(t) => t.send_batch(emails).await,
        }
    }
}
