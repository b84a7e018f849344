//! Feature conditions for the VPC resource controller.
//!
//! Feature toggles live as string values inside one cluster-wide
//! configuration object (`amazon-vpc-cni`). This crate turns that text into
//! boolean decisions that fail safe: a missing object, an empty map, a missing
//! key, a read error or an unparsable value all resolve to *disabled*.
//!
//! ## Modules
//!
//! - `store`: the configuration store seam and an in-memory implementation
//! - `conditions`: the [`Conditions`] evaluator
//! - `readiness`: the data-store sync barrier
//! - `metrics`: the `windows_ipam_enabled` instrument

pub mod conditions;
pub mod error;
pub mod metrics;
pub mod readiness;
pub mod store;

pub use conditions::{parse_bool, Conditions, ControllerConditions, Feature};
pub use error::ConditionError;
pub use metrics::ConditionMetrics;
pub use readiness::{readiness_channel, ReadinessFlag, ReadinessHandle};
pub use store::{ConfigStore, FeatureConfiguration, InMemoryConfigStore, StoreError};

use std::time::Duration;

/// Name of the configuration object holding the feature toggles.
pub const VPC_CNI_CONFIG_MAP_NAME: &str = "amazon-vpc-cni";

/// Namespace the configuration object is read from unless configured otherwise.
pub const DEFAULT_CONFIG_MAP_NAMESPACE: &str = "kube-system";

/// Key toggling Windows IPAM.
pub const ENABLE_WINDOWS_IPAM_KEY: &str = "enable-windows-ipam";

/// How often a pending readiness wait reports that it is still waiting.
pub const CHECK_DATA_STORE_SYNCED_INTERVAL: Duration = Duration::from_secs(10);
