//! Wiring of conditions, reconciler and dispatcher.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::info;
use vrc_condition::{ConditionError, ConfigStore, ControllerConditions, ReadinessFlag};
use vrc_reconcile::{Controller, ObjectKey};

use crate::config::Config;
use crate::configmap::ConfigMapReconciler;
use crate::node_manager::NodeManager;

/// Everything needed to react to config map changes.
pub struct ControllerRuntime {
    conditions: Arc<ControllerConditions>,
    controller: Controller<ConfigMapReconciler>,
}

impl ControllerRuntime {
    /// Build the conditions, the reconciler and its dispatcher.
    ///
    /// Conditions and reconciler share the store but read it independently.
    pub fn new(
        config: &Config,
        store: Arc<dyn ConfigStore>,
        node_manager: Arc<dyn NodeManager>,
        readiness: ReadinessFlag,
    ) -> Self {
        let conditions = Arc::new(
            ControllerConditions::new(
                readiness,
                Arc::clone(&store),
                config.config_map_namespace.clone(),
            )
            .with_sync_log_interval(config.sync_log_interval),
        );

        let reconciler = Arc::new(ConfigMapReconciler::new(store, node_manager));
        let controller = Controller::new(reconciler, config.controller_config());

        Self {
            conditions,
            controller,
        }
    }

    /// Feature conditions for consumers outside the reconcile path.
    pub fn conditions(&self) -> Arc<ControllerConditions> {
        Arc::clone(&self.conditions)
    }

    /// Wait for the initial data-store sync, then dispatch change
    /// notifications until shutdown or until `events` closes.
    pub async fn run(
        &self,
        events: mpsc::Receiver<ObjectKey>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), ConditionError> {
        self.conditions
            .wait_until_ready_or_shutdown(shutdown.clone())
            .await?;
        info!("Controller synced, processing config map changes");

        self.controller.run(events, shutdown).await;
        Ok(())
    }
}
