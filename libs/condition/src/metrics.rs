//! Condition metrics.
//!
//! One process-wide instrument, `windows_ipam_enabled`, labelled by
//! `condition`. It is registered into [`registry`] at most once no matter how
//! many evaluators are constructed, or from how many threads.

use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};
use prometheus::{HistogramOpts, HistogramVec, Registry};
use tracing::{debug, warn};

/// Instrument name.
pub const WINDOWS_IPAM_ENABLED_METRIC: &str = "windows_ipam_enabled";

/// Label dimension.
pub const CONDITION_LABEL: &str = "condition";

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static GLOBAL: Lazy<Arc<ConditionMetrics>> = Lazy::new(|| Arc::new(ConditionMetrics::new()));

static REGISTERED: OnceCell<()> = OnceCell::new();

/// Summary-style instrument recording feature-decision transitions.
#[derive(Clone)]
pub struct ConditionMetrics {
    windows_ipam_enabled: HistogramVec,
}

impl ConditionMetrics {
    /// Create an unregistered instrument set.
    pub fn new() -> Self {
        let windows_ipam_enabled = HistogramVec::new(
            HistogramOpts::new(WINDOWS_IPAM_ENABLED_METRIC, "Windows IPAM enabled condition"),
            &[CONDITION_LABEL],
        )
        .expect("metric can not be created");

        Self {
            windows_ipam_enabled,
        }
    }

    /// Register the instruments into `registry`.
    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.windows_ipam_enabled.clone()))
    }

    /// Record a sample for `condition`.
    pub fn observe(&self, condition: &str, value: f64) {
        self.windows_ipam_enabled
            .with_label_values(&[condition])
            .observe(value);
    }

    /// Number of samples recorded for `condition`.
    pub fn sample_count(&self, condition: &str) -> u64 {
        self.windows_ipam_enabled
            .with_label_values(&[condition])
            .get_sample_count()
    }

    /// Sum of samples recorded for `condition`.
    pub fn sample_sum(&self, condition: &str) -> f64 {
        self.windows_ipam_enabled
            .with_label_values(&[condition])
            .get_sample_sum()
    }
}

impl Default for ConditionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide registry condition metrics are exported from.
pub fn registry() -> &'static Registry {
    &REGISTRY
}

/// Register the process-wide instruments exactly once and return them.
///
/// Safe to call any number of times from any number of threads; only the
/// first call registers, and a registration failure is logged, not raised.
pub fn register_once() -> Arc<ConditionMetrics> {
    REGISTERED.get_or_init(|| match GLOBAL.register(&REGISTRY) {
        Ok(()) => debug!(metric = WINDOWS_IPAM_ENABLED_METRIC, "Registered condition metrics"),
        Err(e) => warn!(error = %e, "Failed to register condition metrics"),
    });

    Arc::clone(&GLOBAL)
}
