//! Operator job submission with an optimistic row.
//!
//! The row appears under a provisional (negative) id before the request is
//! sent. The creation response is the only point where that row is swapped
//! for the backend's record, so a poll racing the request never leaves two
//! copies behind once the response lands.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use ironqueue_core::{Job, JobId, NewJob, SubmissionId};
use tracing::{debug, info, warn};

use crate::client::JobsApi;
use crate::error::SubmitError;
use crate::store::JobStore;

#[derive(Clone)]
pub struct SubmissionController {
    api: Arc<dyn JobsApi>,
    store: JobStore,
    next_provisional: Arc<AtomicU64>,
    default_max_attempts: u32,
}

impl SubmissionController {
    pub fn new(api: Arc<dyn JobsApi>, store: JobStore, default_max_attempts: u32) -> Self {
        Self {
            api,
            store,
            next_provisional: Arc::new(AtomicU64::new(0)),
            default_max_attempts,
        }
    }

    fn next_provisional_id(&self) -> JobId {
        JobId::provisional(self.next_provisional.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Validate, record optimistically, create, reconcile.
    ///
    /// On a transport failure the provisional row stays in the store marked
    /// `FAILED`, so the operator sees what was lost.
    pub async fn submit(&self, request: NewJob) -> Result<Job, SubmitError> {
        let request = request.validated()?;
        let submission = SubmissionId::new();
        let provisional_id = self.next_provisional_id();

        let provisional = Job::queued(
            provisional_id,
            request.job_type.clone(),
            request.payload.clone(),
            self.default_max_attempts,
            Utc::now(),
        );
        self.store.upsert_optimistic(provisional, submission)?;

        info!(
            %submission,
            %provisional_id,
            job_type = %request.job_type,
            "submitting job"
        );

        match self.api.create_job(&request).await {
            Ok(job) => {
                if let Err(conflict) = self.store.confirm_provisional(provisional_id, job.clone()) {
                    debug!(%submission, %conflict, "provisional row already reconciled");
                }
                info!(%submission, job_id = %job.id, "submission confirmed");
                Ok(job)
            }
            Err(err) => {
                let err = SubmitError::Transport(err);
                if let Err(conflict) = self.store.fail_provisional(provisional_id, err.to_string()) {
                    debug!(%submission, %conflict, "could not mark provisional row failed");
                }
                warn!(%submission, %provisional_id, error = %err, "submission failed");
                Err(err)
            }
        }
    }
}
