//! Error taxonomy of the synchronization engine.

use std::time::Duration;

use ironqueue_core::{ReconciliationConflict, ValidationError};

/// A request to the backend failed (network, non-2xx, undecodable body, or
/// no answer in time).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("API error ({0}): {1}")]
    Api(u16, String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// Why an operator submission did not produce a confirmed job.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubmitError {
    /// Rejected before any optimistic write.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The provisional row was written and then marked `FAILED`.
    #[error("submission failed: {0}")]
    Transport(#[from] TransportError),
    /// The optimistic write itself was refused.
    #[error(transparent)]
    Reconciliation(#[from] ReconciliationConflict),
}

/// Why a dashboard session could not be built.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
