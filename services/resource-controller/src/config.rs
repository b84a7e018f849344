//! Controller configuration.
//!
//! The config map name is fixed; everything else is env-driven.

use std::time::Duration;

use anyhow::{Context, Result};
use vrc_condition::{CHECK_DATA_STORE_SYNCED_INTERVAL, DEFAULT_CONFIG_MAP_NAMESPACE};
use vrc_reconcile::{
    ControllerConfig, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BASE_DELAY, DEFAULT_RETRY_MAX_DELAY,
    DEFAULT_RETRY_WINDOW,
};

/// Resource controller configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Namespace of the `amazon-vpc-cni` config map.
    pub config_map_namespace: String,

    /// How often a pending readiness wait logs.
    pub sync_log_interval: Duration,

    /// Retries allowed per key inside the retry window.
    pub max_retries: u32,

    /// Window after which a key's failure count resets.
    pub retry_window: Duration,

    /// Delay before the first retry.
    pub retry_base_delay: Duration,

    /// Upper bound on the retry delay.
    pub retry_max_delay: Duration,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_map_namespace: DEFAULT_CONFIG_MAP_NAMESPACE.to_string(),
            sync_log_interval: CHECK_DATA_STORE_SYNCED_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_window: DEFAULT_RETRY_WINDOW,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            retry_max_delay: DEFAULT_RETRY_MAX_DELAY,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config_map_namespace = lookup("VRC_CONFIG_MAP_NAMESPACE")
            .filter(|ns| !ns.trim().is_empty())
            .unwrap_or(defaults.config_map_namespace);

        let sync_log_interval = parse_var::<u64, _>(&lookup, "VRC_SYNC_LOG_INTERVAL_SECS")?
            .map(|secs| Duration::from_secs(secs.max(1)))
            .unwrap_or(defaults.sync_log_interval);

        let max_retries =
            parse_var::<u32, _>(&lookup, "VRC_MAX_RETRIES")?.unwrap_or(defaults.max_retries);

        let retry_window = parse_var::<u64, _>(&lookup, "VRC_RETRY_WINDOW_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.retry_window);

        let retry_base_delay = parse_var::<u64, _>(&lookup, "VRC_RETRY_BASE_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry_base_delay);

        let retry_max_delay = parse_var::<u64, _>(&lookup, "VRC_RETRY_MAX_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry_max_delay)
            .max(retry_base_delay);

        let log_level = lookup("VRC_LOG_LEVEL").unwrap_or(defaults.log_level);

        Ok(Self {
            config_map_namespace,
            sync_log_interval,
            max_retries,
            retry_window,
            retry_base_delay,
            retry_max_delay,
            log_level,
        })
    }

    /// Dispatcher settings derived from this configuration.
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            max_retries: self.max_retries,
            retry_window: self.retry_window,
            retry_base_delay: self.retry_base_delay,
            retry_max_delay: self.retry_max_delay,
        }
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().parse::<T>())
        .transpose()
        .with_context(|| format!("{name} must be a non-negative integer."))
}
