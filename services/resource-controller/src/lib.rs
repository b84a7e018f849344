//! VPC Resource Controller: config map reconciliation
//!
//! Operators toggle node features by editing the `amazon-vpc-cni` config map.
//! This crate watches for changes to that object and asks the node manager to
//! resynchronize every node, so each node re-derives its desired state from
//! the current configuration.
//!
//! ## Architecture
//!
//! ```text
//! change notification ─► Controller ─► ConfigMapReconciler ─► NodeManager
//!                                                  (fan-out resync)
//! feature consumers ─► ControllerConditions ─► ConfigStore (fresh read)
//! ```
//!
//! The two read paths are independent: the reconciler never passes what it
//! read to the conditions.
//!
//! ## Modules
//!
//! - `configmap`: the reconciliation trigger
//! - `node_manager`: the node manager seam and a mock implementation
//! - `runtime`: wiring of conditions, trigger and dispatcher
//! - `config`: environment-driven configuration
//! - `telemetry`: tracing subscriber setup

pub mod config;
pub mod configmap;
pub mod error;
pub mod node_manager;
pub mod runtime;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use configmap::ConfigMapReconciler;
pub use error::ControllerError;
pub use node_manager::{MockNodeManager, NodeManager};
pub use runtime::ControllerRuntime;
