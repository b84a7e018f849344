//! Config map reconciler.
//!
//! Only the `amazon-vpc-cni` object matters. For it, every notification
//! (create, update or delete) ends in one fan-out call to the node manager.
//! The object read here is only logged; feature decisions are made later by
//! the conditions, from their own read.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};
use vrc_condition::{
    ConfigStore, FeatureConfiguration, ENABLE_WINDOWS_IPAM_KEY, VPC_CNI_CONFIG_MAP_NAME,
};
use vrc_reconcile::{ObjectKey, ReconcileResult, Reconciler};

use crate::error::ControllerError;
use crate::node_manager::NodeManager;

/// Reconciles config map changes into node resynchronizations.
pub struct ConfigMapReconciler {
    store: Arc<dyn ConfigStore>,
    node_manager: Arc<dyn NodeManager>,
}

impl ConfigMapReconciler {
    /// Create a new reconciler.
    pub fn new(store: Arc<dyn ConfigStore>, node_manager: Arc<dyn NodeManager>) -> Self {
        Self {
            store,
            node_manager,
        }
    }
}

#[async_trait]
impl Reconciler for ConfigMapReconciler {
    type Error = ControllerError;

    async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileResult, ControllerError> {
        // Only amazon-vpc-cni updates concern nodes
        if key.name != VPC_CNI_CONFIG_MAP_NAME {
            return Ok(ReconcileResult::done());
        }

        let config_map = match self.store.get_config_map(key).await {
            Ok(config_map) => config_map,
            Err(e) if e.is_not_found() => {
                info!(configmap = %key, "ConfigMap is deleted");
                FeatureConfiguration::default()
            }
            Err(e) => {
                error!(configmap = %key, error = %e, "Failed to get ConfigMap");
                return Err(ControllerError::Fetch {
                    key: key.clone(),
                    source: e,
                });
            }
        };

        info!(
            configmap = %key,
            enable_windows_ipam = config_map.get(ENABLE_WINDOWS_IPAM_KEY).unwrap_or_default(),
            "ConfigMap changed, updating nodes"
        );

        if let Err(e) = self.node_manager.update_nodes_on_config_map_changes().await {
            error!(
                configmap = %key,
                error = %e,
                "Failed to update nodes on configmap changes"
            );
            return Err(ControllerError::NodeSync(e));
        }

        Ok(ReconcileResult::done())
    }
}
