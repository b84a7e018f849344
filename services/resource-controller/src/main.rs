//! VPC resource controller
//!
//! Runs the config map reconciliation loop against an in-memory store and a
//! mock node manager. The cluster-backed store and node manager plug in
//! through the same `ConfigStore` and `NodeManager` seams.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};
use vrc_condition::{readiness_channel, InMemoryConfigStore, VPC_CNI_CONFIG_MAP_NAME};
use vrc_reconcile::ObjectKey;
use vrc_resource_controller::{telemetry, Config, ControllerRuntime, MockNodeManager};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    telemetry::init_tracing(&config.log_level)?;

    info!(
        config_map_namespace = %config.config_map_namespace,
        max_retries = config.max_retries,
        "Starting VPC resource controller"
    );

    // Create the store and node manager (in-memory for now)
    let store = Arc::new(InMemoryConfigStore::new());
    let node_manager = Arc::new(MockNodeManager::new());

    // The in-memory store has nothing to sync.
    let (readiness, flag) = readiness_channel();
    readiness.mark_ready();

    let runtime = ControllerRuntime::new(&config, store, node_manager, flag);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (events_tx, events_rx) = mpsc::channel(64);

    // Resync once on startup.
    events_tx
        .send(ObjectKey::new(
            config.config_map_namespace.clone(),
            VPC_CNI_CONFIG_MAP_NAME,
        ))
        .await?;

    let runtime_handle = tokio::spawn(async move { runtime.run(events_rx, shutdown_rx).await });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = runtime_handle => {
            match result {
                Ok(Ok(())) => info!("Controller exited"),
                Ok(Err(e)) => error!(error = %e, "Controller stopped before syncing"),
                Err(e) => error!(error = %e, "Controller task panicked"),
            }
        }
    }

    let _ = shutdown_tx.send(true);
    drop(events_tx);

    info!("Resource controller shutdown complete");
    Ok(())
}
