//! `ironqueue-core`: job records as the dashboard sees them.
//!
//! This crate contains **pure domain** types (no IO, no async). The backend is
//! the authority on job state; these types only describe what it reports and
//! what an operator may submit.

pub mod error;
pub mod id;
pub mod job;

pub use error::{ReconciliationConflict, ValidationError};
pub use id::{JobId, SubmissionId};
pub use job::{Job, JobStatus, NewJob};
