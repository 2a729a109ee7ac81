//! Domain error model.

use thiserror::Error;

use crate::id::JobId;

/// Malformed operator input, rejected before anything is written locally.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("job type must not be empty")]
    EmptyType,

    #[error("payload must be a JSON object, got {0}")]
    PayloadNotObject(&'static str),
}

/// A local record and an authoritative one could not be merged.
///
/// The store resolves every ordinary race with last-write-wins, so these are
/// logged and reported, never panicked on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconciliationConflict {
    /// An optimistic write targeted an id the backend already owns.
    #[error("job {0} is already known to the backend; optimistic write refused")]
    ServerOwned(JobId),

    /// Confirmation arrived for a provisional row that is no longer present.
    #[error("provisional job {0} is no longer pending confirmation")]
    MissingProvisional(JobId),

    /// The store has been closed; the write was dropped.
    #[error("store is closed")]
    Closed,
}
