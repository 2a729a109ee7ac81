//! In-memory job backend for tests/dev.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use ironqueue_core::{Job, JobId, JobStatus, NewJob};

use super::JobsApi;
use crate::error::TransportError;

/// Number of calls received per endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApiCalls {
    pub list: usize,
    pub get: usize,
    pub create: usize,
}

#[derive(Debug, Default)]
struct BackendState {
    jobs: BTreeMap<JobId, Job>,
    failure: Option<TransportError>,
    latency: Duration,
    get_latency: HashMap<JobId, Duration>,
    calls: ApiCalls,
}

/// In-memory stand-in for the job backend.
///
/// - Assigns positive ids on create (`max + 1`)
/// - Optional injected failure and latency, to exercise the unhappy paths
#[derive(Debug)]
pub struct InMemoryJobsApi {
    state: Mutex<BackendState>,
    default_max_attempts: u32,
}

impl InMemoryJobsApi {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BackendState::default()),
            default_max_attempts: 3,
        }
    }

    pub fn with_jobs(jobs: impl IntoIterator<Item = Job>) -> Self {
        let api = Self::new();
        for job in jobs {
            api.put(job);
        }
        api
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a job as the backend would after a state change.
    pub fn put(&self, job: Job) {
        self.lock().jobs.insert(job.id, job);
    }

    pub fn remove(&self, id: JobId) -> Option<Job> {
        self.lock().jobs.remove(&id)
    }

    pub fn job(&self, id: JobId) -> Option<Job> {
        self.lock().jobs.get(&id).cloned()
    }

    /// Make every subsequent call fail with `failure` (or succeed again with `None`).
    pub fn fail_with(&self, failure: Option<TransportError>) {
        self.lock().failure = failure;
    }

    /// Delay every response by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Delay `GET /jobs/{id}` for one id only.
    pub fn set_get_latency(&self, id: JobId, latency: Duration) {
        self.lock().get_latency.insert(id, latency);
    }

    pub fn calls(&self) -> ApiCalls {
        self.lock().calls
    }

    async fn respond(&self, latency: Duration) -> Result<(), TransportError> {
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        match &self.lock().failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryJobsApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobsApi for InMemoryJobsApi {
    async fn list_jobs(&self, status: Option<&JobStatus>) -> Result<Vec<Job>, TransportError> {
        let latency = {
            let mut state = self.lock();
            state.calls.list += 1;
            state.latency
        };
        self.respond(latency).await?;

        let state = self.lock();
        Ok(state
            .jobs
            .values()
            .filter(|j| status.map_or(true, |s| &j.status == s))
            .cloned()
            .collect())
    }

    async fn get_job(&self, id: JobId) -> Result<Option<Job>, TransportError> {
        let latency = {
            let mut state = self.lock();
            state.calls.get += 1;
            state.get_latency.get(&id).copied().unwrap_or(state.latency)
        };
        self.respond(latency).await?;

        Ok(self.lock().jobs.get(&id).cloned())
    }

    async fn create_job(&self, job: &NewJob) -> Result<Job, TransportError> {
        let latency = {
            let mut state = self.lock();
            state.calls.create += 1;
            state.latency
        };
        self.respond(latency).await?;

        let mut state = self.lock();
        let next = state
            .jobs
            .keys()
            .next_back()
            .map_or(1, |id| id.get().max(0) + 1);
        let created = Job::queued(
            JobId::new(next),
            job.job_type.clone(),
            job.payload.clone(),
            self.default_max_attempts,
            Utc::now(),
        );
        state.jobs.insert(created.id, created.clone());
        Ok(created)
    }
}
