//! Reconciliation primitives.
//!
//! This library provides the pieces shared by every reconciler in the
//! workspace:
//!
//! - **Object keys**: the namespaced name a change notification refers to.
//! - **Reconcilers**: re-read current state for a key and drive dependents
//!   back into agreement with it.
//! - **Dispatch**: [`Controller`] feeds keys to a reconciler one at a time and
//!   requeues failures with exponential backoff.
//!
//! # Invariants
//!
//! - Reconcilers must be idempotent: the same key may be delivered any number
//!   of times, including after the object was deleted.
//! - Notifications carry no event kind; reconcilers always re-fetch.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;

mod controller;

pub use controller::{Controller, ControllerConfig};

/// Namespaced name of a watched object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    /// Namespace the object lives in.
    pub namespace: String,

    /// Object name.
    pub name: String,
}

impl ObjectKey {
    /// Create a new key.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Outcome of a successful reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileResult {
    /// Deliver the key again after this delay, even without a new notification.
    pub requeue_after: Option<Duration>,
}

impl ReconcileResult {
    /// Nothing left to do for this key.
    pub fn done() -> Self {
        Self::default()
    }
}

/// Converges dependent state for a single changed object.
///
/// Returning an error tells the dispatcher a retry is needed.
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// Error reported when a pass has to be retried.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reconcile the object identified by `key`.
    async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileResult, Self::Error>;
}

/// Retry tracker for failed reconciliations.
#[derive(Debug, Clone)]
pub struct RetryTracker {
    /// Maximum retries per key.
    max_retries: u32,

    /// Retry window duration.
    window: Duration,

    /// Tracked failures: key -> (count, first_failure_time).
    failures: BTreeMap<ObjectKey, (u32, Instant)>,
}

impl RetryTracker {
    /// Create a new retry tracker.
    pub fn new(max_retries: u32, window: Duration) -> Self {
        Self {
            max_retries,
            window,
            failures: BTreeMap::new(),
        }
    }

    /// Record a failure for a key.
    ///
    /// Returns true if retries are exhausted.
    pub fn record_failure(&mut self, key: &ObjectKey) -> bool {
        let now = Instant::now();

        let (count, first) = self.failures.entry(key.clone()).or_insert((0, now));

        // Reset if outside window
        if now.duration_since(*first) > self.window {
            *count = 0;
            *first = now;
        }

        *count += 1;
        *count > self.max_retries
    }

    /// Number of failures recorded for a key inside the current window.
    pub fn attempts(&self, key: &ObjectKey) -> u32 {
        match self.failures.get(key) {
            Some((count, first)) if first.elapsed() <= self.window => *count,
            _ => 0,
        }
    }

    /// Clear failure tracking for a key (on success).
    pub fn clear(&mut self, key: &ObjectKey) {
        self.failures.remove(key);
    }

    /// Prune expired entries.
    pub fn prune(&mut self) {
        let now = Instant::now();
        self.failures
            .retain(|_, (_, first)| now.duration_since(*first) <= self.window);
    }
}

/// Delay before the `attempt`-th retry: `base * 2^(attempt - 1)`, capped at `max`.
pub fn backoff_delay(base: Duration, max: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << exponent).min(max)
}

/// Default retry limit per key.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default retry window.
pub const DEFAULT_RETRY_WINDOW: Duration = Duration::from_secs(10 * 60); // 10 minutes

/// Default delay before the first retry.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Default upper bound on the retry delay.
pub const DEFAULT_RETRY_MAX_DELAY: Duration = Duration::from_secs(30);
