//! Feature-flag evaluation.
//!
//! Decisions are recomputed from a fresh store read on every query. Any
//! ambiguity resolves to *disabled*: wrongly enabling a feature on the fleet
//! is assumed worse than wrongly leaving it off.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info};
use vrc_reconcile::ObjectKey;

use crate::metrics::{self, ConditionMetrics};
use crate::readiness::MIN_LOG_INTERVAL;
use crate::{
    ConditionError, ConfigStore, ReadinessFlag, CHECK_DATA_STORE_SYNCED_INTERVAL,
    ENABLE_WINDOWS_IPAM_KEY, VPC_CNI_CONFIG_MAP_NAME,
};

/// Label the initial `0` observation is recorded under.
const INITIAL_OBSERVATION_LABEL: &str = "enable_windows_ipam";

/// Features known to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// IP address management for Windows nodes.
    WindowsIpam,

    /// Security groups for pods.
    PodSecurityGroups,
}

impl Feature {
    /// Flag name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::WindowsIpam => ENABLE_WINDOWS_IPAM_KEY,
            Self::PodSecurityGroups => "pod-security-groups",
        }
    }
}

impl FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ENABLE_WINDOWS_IPAM_KEY => Ok(Self::WindowsIpam),
            "pod-security-groups" => Ok(Self::PodSecurityGroups),
            other => Err(format!("unknown feature: {other}")),
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse a boolean literal.
///
/// Accepts `1 t T TRUE true True` and `0 f F FALSE false False`; anything
/// else is `None`.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Feature conditions consulted before feature-dependent work.
#[async_trait]
pub trait Conditions: Send + Sync {
    /// Wait until the pod data store has completed its initial sync.
    async fn wait_until_ready(&self) -> Result<(), ConditionError>;

    /// Whether Windows IPAM is enabled. Never fails; errors mean disabled.
    async fn is_windows_ipam_enabled(&self) -> bool;

    /// Whether security groups for pods are enabled.
    ///
    /// Not implemented yet: always returns [`ConditionError::NotImplemented`].
    /// Callers decide whether that means disabled or a configuration error.
    async fn is_pod_sgp_enabled(&self) -> Result<bool, ConditionError>;

    /// Evaluate any known feature.
    async fn is_enabled(&self, feature: Feature) -> Result<bool, ConditionError> {
        match feature {
            Feature::WindowsIpam => Ok(self.is_windows_ipam_enabled().await),
            Feature::PodSecurityGroups => self.is_pod_sgp_enabled().await,
        }
    }
}

/// [`Conditions`] backed by a configuration store.
pub struct ControllerConditions {
    readiness: ReadinessFlag,
    store: Arc<dyn ConfigStore>,
    config_map: ObjectKey,
    metrics: Arc<ConditionMetrics>,
    sync_log_interval: Duration,
}

impl ControllerConditions {
    /// Create conditions reading `amazon-vpc-cni` from `namespace`, reporting
    /// to the process-wide metrics.
    pub fn new(
        readiness: ReadinessFlag,
        store: Arc<dyn ConfigStore>,
        namespace: impl Into<String>,
    ) -> Self {
        Self::with_metrics(readiness, store, namespace, metrics::register_once())
    }

    /// Create conditions reporting to the given metrics.
    pub fn with_metrics(
        readiness: ReadinessFlag,
        store: Arc<dyn ConfigStore>,
        namespace: impl Into<String>,
        metrics: Arc<ConditionMetrics>,
    ) -> Self {
        metrics.observe(INITIAL_OBSERVATION_LABEL, 0.0);

        Self {
            readiness,
            store,
            config_map: ObjectKey::new(namespace, VPC_CNI_CONFIG_MAP_NAME),
            metrics,
            sync_log_interval: CHECK_DATA_STORE_SYNCED_INTERVAL,
        }
    }

    /// Override how often a pending readiness wait logs. Clamped to
    /// [`MIN_LOG_INTERVAL`].
    pub fn with_sync_log_interval(mut self, interval: Duration) -> Self {
        self.sync_log_interval = interval.max(MIN_LOG_INTERVAL);
        self
    }

    /// Key of the configuration object flags are read from.
    pub fn config_map(&self) -> &ObjectKey {
        &self.config_map
    }

    /// Wait for readiness, giving up when `shutdown` flips true.
    pub async fn wait_until_ready_or_shutdown(
        &self,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), ConditionError> {
        self.readiness
            .wait_or_shutdown(self.sync_log_interval, shutdown)
            .await
    }

    /// Wait for readiness, giving up after `deadline`.
    pub async fn wait_until_ready_with_deadline(
        &self,
        deadline: Duration,
    ) -> Result<(), ConditionError> {
        self.readiness
            .wait_with_deadline(self.sync_log_interval, deadline)
            .await
    }

    /// Read a flag and parse it, resolving every failure to `false`.
    async fn read_flag(&self, key: &str) -> bool {
        let config = match self.store.get_config_map(&self.config_map).await {
            Ok(config) => config,
            Err(e) => {
                debug!(
                    configmap = %self.config_map,
                    error = %e,
                    flag = key,
                    "Flag unreadable, treating as disabled"
                );
                return false;
            }
        };

        if config.is_empty() {
            return false;
        }

        config.get(key).and_then(parse_bool).unwrap_or(false)
    }
}

#[async_trait]
impl Conditions for ControllerConditions {
    async fn wait_until_ready(&self) -> Result<(), ConditionError> {
        self.readiness.wait(self.sync_log_interval).await
    }

    async fn is_windows_ipam_enabled(&self) -> bool {
        let enabled = self.read_flag(ENABLE_WINDOWS_IPAM_KEY).await;
        if enabled {
            info!("Return IsWindowsIPAMEnabled = True");
            self.metrics.observe(ENABLE_WINDOWS_IPAM_KEY, 1.0);
        }
        enabled
    }

    async fn is_pod_sgp_enabled(&self) -> Result<bool, ConditionError> {
        Err(ConditionError::NotImplemented(Feature::PodSecurityGroups))
    }
}
