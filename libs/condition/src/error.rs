//! Error types for condition evaluation.

use std::time::Duration;

use thiserror::Error;

use crate::Feature;

/// Errors surfaced by [`crate::Conditions`].
///
/// Flag decisions themselves never fail; these cover capabilities that do
/// not exist yet and readiness waits that cannot complete.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConditionError {
    /// The feature is known but its evaluation is not implemented.
    #[error("feature {} is not implemented", .0.name())]
    NotImplemented(Feature),

    /// Shutdown was requested while waiting for readiness.
    #[error("readiness wait cancelled by shutdown")]
    Cancelled,

    /// Readiness was not signalled before the deadline.
    #[error("readiness not signalled within {0:?}")]
    ReadinessTimeout(Duration),

    /// The readiness writer went away without ever signalling.
    #[error("readiness signal dropped before becoming ready")]
    ReadinessAbandoned,
}
