//! Cooperative stop signal for in-progress runs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Cloneable flag that asks a running campaign to stop.
///
/// The controller checks it between units of work and while pausing, so the
/// in-flight send and its ledger write always complete first.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop; idempotent
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Resolves once `stop` has been called
    pub async fn stopped(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_stopped() {
                return;
            }
            notified.await;
        }
    }

    /// Sleep for `duration` unless a stop arrives first.
    ///
    /// Returns `true` if the sleep was cut short.
    pub async fn sleep(&self, duration: std::time::Duration) -> bool {
        if duration.is_zero() {
            return self.is_stopped();
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.is_stopped(),
            _ = self.stopped() => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_stop_is_visible_to_clones() {
        let signal = StopSignal::new();
        let clone = signal.clone();
        assert!(!clone.is_stopped());
        signal.stop();
        assert!(clone.is_stopped());
    }

    #[tokio::test]
    async fn test_stopped_resolves_after_stop() {
        let signal = StopSignal::new();
        let waiter = signal.clone();
        let handle = tokio::spawn(async move { waiter.stopped().await });
        tokio::task::yield_now().await;
        signal.stop();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_is_cut_short() {
        let signal = StopSignal::new();
        let stopper = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            stopper.stop();
        });

        let started = tokio::time::Instant::now();
        assert!(signal.sleep(Duration::from_secs(60)).await);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_runs_to_completion() {
        let signal = StopSignal::new();
        assert!(!signal.sleep(Duration::from_millis(250)).await);
    }
}
