//! Wiring of the store, poller, detail loader and submissions for one
//! dashboard instance.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ironqueue_core::{Job, JobId, NewJob};
use tracing::info;

use crate::client::{HttpJobsApi, JobsApi};
use crate::config::DashboardConfig;
use crate::detail::{DetailView, JobDetailLoader};
use crate::error::{SessionError, SubmitError};
use crate::poller::{PollOutcome, Poller, PollerHandle, PollerStats};
use crate::store::JobStore;
use crate::submission::SubmissionController;
use crate::view::{JobView, StatusFilter, ViewMemo};

/// One running dashboard.
///
/// Lifecycle: `start` spawns the poll loop, `stop` waits for it to exit, and
/// `dispose` additionally clears the detail panel and closes the store so
/// that late responses cannot write into it.
pub struct DashboardSession {
    config: DashboardConfig,
    store: JobStore,
    poller: Poller,
    handle: Mutex<Option<PollerHandle>>,
    detail: JobDetailLoader,
    submissions: SubmissionController,
    memo: Mutex<ViewMemo>,
}

impl DashboardSession {
    /// Session talking HTTP to `config.api_url`.
    pub fn new(config: DashboardConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let api = HttpJobsApi::new(config.api_url.clone(), config.request_timeout)?;
        Ok(Self::with_api(config, Arc::new(api)))
    }

    pub fn with_api(config: DashboardConfig, api: Arc<dyn JobsApi>) -> Self {
        let store = JobStore::new();
        Self {
            poller: Poller::new(api.clone(), store.clone(), config.poller_config()),
            detail: JobDetailLoader::new(api.clone(), store.clone()),
            submissions: SubmissionController::new(api, store.clone(), config.default_max_attempts),
            handle: Mutex::new(None),
            memo: Mutex::new(ViewMemo::new()),
            store,
            config,
        }
    }

    fn lock_handle(&self) -> MutexGuard<'_, Option<PollerHandle>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn detail(&self) -> &JobDetailLoader {
        &self.detail
    }

    pub fn submissions(&self) -> &SubmissionController {
        &self.submissions
    }

    /// Spawn the poll loop. Calling it again while running does nothing.
    pub fn start(&self) {
        if self.store.is_closed() {
            return;
        }
        let mut handle = self.lock_handle();
        if handle.as_ref().is_some_and(PollerHandle::is_running) {
            return;
        }
        *handle = Some(self.poller.start());
        info!(api_url = %self.config.api_url, "dashboard session started");
    }

    pub fn is_running(&self) -> bool {
        self.lock_handle().as_ref().is_some_and(PollerHandle::is_running)
    }

    /// Stop polling and wait for the loop to exit.
    pub async fn stop(&self) {
        let handle = self.lock_handle().take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
    }

    /// Tear down: no store write happens after this returns.
    pub async fn dispose(&self) {
        self.stop().await;
        self.detail.clear();
        self.store.close();
        info!(jobs = self.store.len(), "dashboard session disposed");
    }

    /// Run one poll cycle now.
    pub async fn refresh(&self) -> PollOutcome {
        self.poller.poll_once().await
    }

    pub fn poller_stats(&self) -> PollerStats {
        self.poller.stats()
    }

    /// Counts and filtered rows, recomputed only when the store, query or
    /// filter changed.
    pub fn view(&self, query: &str, filter: &StatusFilter) -> Arc<JobView> {
        self.memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .view(&self.store, query, filter)
    }

    pub async fn submit(&self, request: NewJob) -> Result<Job, SubmitError> {
        self.submissions.submit(request).await
    }

    pub async fn select(&self, id: Option<JobId>) -> DetailView {
        self.detail.select(id).await
    }
}
