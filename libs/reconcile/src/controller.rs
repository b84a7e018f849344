//! In-process dispatcher that drives a [`Reconciler`].
//!
//! The controller:
//! - Receives object keys from a change-notification channel
//! - Runs one reconciliation at a time, so a key is never reconciled concurrently
//! - Requeues failed keys with capped exponential backoff until they succeed

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::{
    backoff_delay, ObjectKey, Reconciler, RetryTracker, DEFAULT_MAX_RETRIES,
    DEFAULT_RETRY_BASE_DELAY, DEFAULT_RETRY_MAX_DELAY, DEFAULT_RETRY_WINDOW,
};

/// Controller configuration.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Retries allowed per key inside `retry_window`.
    pub max_retries: u32,

    /// Window after which a key's failure count resets.
    pub retry_window: Duration,

    /// Delay before the first retry.
    pub retry_base_delay: Duration,

    /// Upper bound on the retry delay.
    pub retry_max_delay: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_window: DEFAULT_RETRY_WINDOW,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            retry_max_delay: DEFAULT_RETRY_MAX_DELAY,
        }
    }
}

/// Serializing dispatcher for a single reconciler.
pub struct Controller<R> {
    reconciler: Arc<R>,
    config: ControllerConfig,
}

impl<R> Controller<R>
where
    R: Reconciler + 'static,
{
    /// Create a new controller.
    pub fn new(reconciler: Arc<R>, config: ControllerConfig) -> Self {
        Self { reconciler, config }
    }

    /// Run until shutdown or until the event source closes.
    pub async fn run(
        &self,
        mut events: mpsc::Receiver<ObjectKey>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(
            max_retries = self.config.max_retries,
            retry_base_delay_ms = self.config.retry_base_delay.as_millis() as u64,
            "Starting controller"
        );

        if *shutdown.borrow_and_update() {
            info!("Controller shutting down");
            return;
        }

        let (requeue_tx, mut requeue_rx) = mpsc::unbounded_channel();
        let mut retries = RetryTracker::new(self.config.max_retries, self.config.retry_window);

        loop {
            let key = tokio::select! {
                event = events.recv() => match event {
                    Some(key) => key,
                    None => {
                        info!("Event source closed, controller stopping");
                        break;
                    }
                },
                Some(key) = requeue_rx.recv() => key,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Controller shutting down");
                        break;
                    }
                    continue;
                }
            };

            self.process(key, &mut retries, &requeue_tx).await;
            retries.prune();
        }
    }

    async fn process(
        &self,
        key: ObjectKey,
        retries: &mut RetryTracker,
        requeue_tx: &mpsc::UnboundedSender<ObjectKey>,
    ) {
        debug!(key = %key, "Reconciling");

        match self.reconciler.reconcile(&key).await {
            Ok(result) => {
                retries.clear(&key);
                if let Some(delay) = result.requeue_after {
                    schedule_requeue(requeue_tx.clone(), key, delay);
                }
            }
            Err(e) => {
                // Keys are never dropped; past the retry budget only the
                // log level changes.
                let exhausted = retries.record_failure(&key);
                let attempt = retries.attempts(&key);
                let delay = backoff_delay(
                    self.config.retry_base_delay,
                    self.config.retry_max_delay,
                    attempt,
                );
                if exhausted {
                    error!(
                        key = %key,
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Reconciliation failing repeatedly, will retry"
                    );
                } else {
                    warn!(
                        key = %key,
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Reconciliation failed, will retry"
                    );
                }
                schedule_requeue(requeue_tx.clone(), key, delay);
            }
        }
    }
}

fn schedule_requeue(tx: mpsc::UnboundedSender<ObjectKey>, key: ObjectKey, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        // Receiver is gone once the controller stopped.
        let _ = tx.send(key);
    });
}
