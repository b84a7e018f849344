//! Node manager interface and mock implementation.
//!
//! The node manager owns per-node resource allocation. This crate only
//! needs its fan-out operation: resynchronize every node against the current
//! cluster configuration.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

/// Fleet-wide node resynchronization.
#[async_trait]
pub trait NodeManager: Send + Sync {
    /// Re-derive every node's desired state from the current configuration.
    ///
    /// Must be idempotent and safe to call concurrently. Called for deletions
    /// too, which means "reset to the default configuration".
    async fn update_nodes_on_config_map_changes(&self) -> Result<()>;
}

/// Mock node manager for testing and development.
pub struct MockNodeManager {
    /// Number of synchronizations requested.
    syncs: AtomicU64,

    /// Whether synchronizations should "fail".
    fail_syncs: AtomicBool,
}

impl MockNodeManager {
    /// Create a new mock node manager.
    pub fn new() -> Self {
        Self {
            syncs: AtomicU64::new(0),
            fail_syncs: AtomicBool::new(false),
        }
    }

    /// Create a mock node manager that fails all synchronizations.
    pub fn failing() -> Self {
        Self {
            syncs: AtomicU64::new(0),
            fail_syncs: AtomicBool::new(true),
        }
    }

    /// Toggle failure injection.
    pub fn set_failing(&self, failing: bool) {
        self.fail_syncs.store(failing, Ordering::SeqCst);
    }

    /// Number of synchronizations requested so far, failed ones included.
    pub fn sync_count(&self) -> u64 {
        self.syncs.load(Ordering::SeqCst)
    }
}

impl Default for MockNodeManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeManager for MockNodeManager {
    async fn update_nodes_on_config_map_changes(&self) -> Result<()> {
        let sync = self.syncs.fetch_add(1, Ordering::SeqCst) + 1;

        if self.fail_syncs.load(Ordering::SeqCst) {
            anyhow::bail!("Mock node manager configured to fail");
        }

        info!(sync, "[MOCK] Updating nodes on config map changes");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_counts_syncs() {
        let manager = MockNodeManager::new();

        manager.update_nodes_on_config_map_changes().await.unwrap();
        manager.update_nodes_on_config_map_changes().await.unwrap();

        assert_eq!(manager.sync_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_failure_injection() {
        let manager = MockNodeManager::failing();
        assert!(manager.update_nodes_on_config_map_changes().await.is_err());

        manager.set_failing(false);
        assert!(manager.update_nodes_on_config_map_changes().await.is_ok());
        assert_eq!(manager.sync_count(), 2);
    }
}
