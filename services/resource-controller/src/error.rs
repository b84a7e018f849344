//! Error types for the config map reconciler.

use thiserror::Error;
use vrc_condition::StoreError;
use vrc_reconcile::ObjectKey;

/// Reconciliation failures. Both variants mean "retry needed".
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The config map could not be read (and was not simply absent).
    #[error("failed to get config map {key}: {source}")]
    Fetch {
        key: ObjectKey,
        #[source]
        source: StoreError,
    },

    /// The node manager failed to resynchronize nodes.
    #[error("failed to update nodes on config map changes: {0}")]
    NodeSync(#[source] anyhow::Error),
}

impl ControllerError {
    /// Short reason code for logs.
    pub fn reason_code(&self) -> &'static str {
        match self {
            ControllerError::Fetch { .. } => "fetch_failed",
            ControllerError::NodeSync(_) => "node_sync_failed",
        }
    }
}
