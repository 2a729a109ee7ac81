//! Backend contract consumed by the dashboard.
//!
//! - `GET /jobs[?status=S]` lists jobs
//! - `GET /jobs/{id}` returns one job, 404 if unknown
//! - `POST /jobs` creates a job and returns the authoritative record

use async_trait::async_trait;
use ironqueue_core::{Job, JobId, JobStatus, NewJob};

use crate::error::TransportError;

pub mod http;
pub mod in_memory;

pub use http::HttpJobsApi;
pub use in_memory::InMemoryJobsApi;

/// The three calls the dashboard makes against the job backend.
#[async_trait]
pub trait JobsApi: Send + Sync {
    /// List jobs, optionally restricted to one status.
    async fn list_jobs(&self, status: Option<&JobStatus>) -> Result<Vec<Job>, TransportError>;

    /// Fetch one job; `Ok(None)` when the backend does not know the id.
    async fn get_job(&self, id: JobId) -> Result<Option<Job>, TransportError>;

    /// Create a job and return the backend's record of it.
    async fn create_job(&self, job: &NewJob) -> Result<Job, TransportError>;
}
