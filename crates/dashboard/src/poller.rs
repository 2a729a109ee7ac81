//! Background refresh of the job store.
//!
//! One cycle fetches the configured scope and merges it into the store as a
//! single snapshot. Cycles never overlap: a tick that arrives while a cycle is
//! still in flight is skipped. A failed cycle leaves the store untouched.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use ironqueue_core::{JobId, JobStatus};
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::client::JobsApi;
use crate::error::TransportError;
use crate::store::{JobStore, MergeReport, Snapshot};

/// Which backend queries make up one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollScope {
    /// One unfiltered `GET /jobs`.
    All,
    /// One `GET /jobs?status=S` per status, issued concurrently.
    Partitioned(Vec<JobStatus>),
}

impl Default for PollScope {
    fn default() -> Self {
        PollScope::Partitioned(JobStatus::KNOWN.to_vec())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    /// Time between cycle starts.
    pub interval: Duration,
    /// Upper bound for one cycle, all partitions included.
    pub cycle_timeout: Duration,
    pub scope: PollScope,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            cycle_timeout: Duration::from_secs(10),
            scope: PollScope::default(),
        }
    }
}

impl PollerConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_cycle_timeout(mut self, timeout: Duration) -> Self {
        self.cycle_timeout = timeout;
        self
    }

    pub fn with_scope(mut self, scope: PollScope) -> Self {
        self.scope = scope;
        self
    }
}

/// Result of one call to [`Poller::poll_once`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The snapshot was merged.
    Applied(MergeReport),
    /// Another cycle was still in flight; nothing was requested.
    Skipped,
    /// The cycle failed; the store was not touched.
    Failed(TransportError),
}

/// Poller runtime statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PollerStats {
    pub cycles: u64,
    pub applied: u64,
    pub skipped: u64,
    pub failed: u64,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_success_at: Option<DateTime<Utc>>,
}

struct PollerInner {
    api: Arc<dyn JobsApi>,
    store: JobStore,
    config: PollerConfig,
    in_flight: AtomicBool,
    stats: Mutex<PollerStats>,
}

/// Periodically replaces the store contents with fresh backend snapshots.
#[derive(Clone)]
pub struct Poller {
    inner: Arc<PollerInner>,
}

/// Clears the in-flight flag when a cycle ends, including when its future is
/// dropped mid-request.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Poller {
    pub fn new(api: Arc<dyn JobsApi>, store: JobStore, config: PollerConfig) -> Self {
        Self {
            inner: Arc::new(PollerInner {
                api,
                store,
                config,
                in_flight: AtomicBool::new(false),
                stats: Mutex::new(PollerStats::default()),
            }),
        }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.inner.config
    }

    pub fn stats(&self) -> PollerStats {
        self.lock_stats().clone()
    }

    fn lock_stats(&self) -> MutexGuard<'_, PollerStats> {
        self.inner.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one cycle now.
    ///
    /// Returns [`PollOutcome::Skipped`] without issuing a request when another
    /// cycle is still in flight.
    pub async fn poll_once(&self) -> PollOutcome {
        let Some(_in_flight) = InFlight::acquire(&self.inner.in_flight) else {
            debug!("poll cycle skipped; previous cycle still in flight");
            let mut stats = self.lock_stats();
            stats.cycles += 1;
            stats.skipped += 1;
            return PollOutcome::Skipped;
        };

        let timeout = self.inner.config.cycle_timeout;
        let fetched = tokio::time::timeout(timeout, self.fetch_snapshot())
            .await
            .unwrap_or(Err(TransportError::Timeout(timeout)));

        match fetched {
            Ok(snapshot) => {
                let jobs = snapshot.jobs.len();
                let report = self.inner.store.replace_snapshot(snapshot);

                let mut stats = self.lock_stats();
                stats.cycles += 1;
                stats.applied += 1;
                stats.consecutive_failures = 0;
                stats.last_error = None;
                stats.last_success_at = Some(Utc::now());

                debug!(
                    jobs,
                    inserted = report.inserted,
                    updated = report.updated,
                    marked_stale = report.marked_stale,
                    "poll cycle applied"
                );
                PollOutcome::Applied(report)
            }
            Err(err) => {
                let mut stats = self.lock_stats();
                stats.cycles += 1;
                stats.failed += 1;
                stats.consecutive_failures += 1;
                stats.last_error = Some(err.to_string());

                warn!(
                    error = %err,
                    consecutive_failures = stats.consecutive_failures,
                    "poll cycle failed; keeping previous data"
                );
                PollOutcome::Failed(err)
            }
        }
    }

    async fn fetch_snapshot(&self) -> Result<Snapshot, TransportError> {
        let api = &self.inner.api;
        match &self.inner.config.scope {
            PollScope::All => Ok(Snapshot::full(api.list_jobs(None).await?)),
            PollScope::Partitioned(statuses) => {
                let partitions =
                    try_join_all(statuses.iter().map(|status| api.list_jobs(Some(status)))).await?;

                // A job that changed status between two partition reads shows
                // up twice; the later partition wins.
                let mut merged = BTreeMap::<JobId, _>::new();
                for job in partitions.into_iter().flatten() {
                    merged.insert(job.id, job);
                }

                Ok(Snapshot::partial(
                    statuses.iter().cloned(),
                    merged.into_values().collect(),
                ))
            }
        }
    }

    /// Spawn the polling loop on the current tokio runtime.
    ///
    /// The first cycle starts immediately.
    pub fn start(&self) -> PollerHandle {
        let shutdown = Arc::new(Notify::new());
        let refresh = Arc::new(Notify::new());

        let poller = self.clone();
        let stop_signal = shutdown.clone();
        let refresh_signal = refresh.clone();

        let join = tokio::spawn(async move {
            info!(
                interval_ms = poller.inner.config.interval.as_millis() as u64,
                scope = ?poller.inner.config.scope,
                "poller started"
            );

            let mut ticker = tokio::time::interval(poller.inner.config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = stop_signal.notified() => break,
                    _ = ticker.tick() => {}
                    _ = refresh_signal.notified() => {}
                }

                // Dropping the cycle future here cancels it before its write.
                tokio::select! {
                    biased;
                    _ = stop_signal.notified() => {
                        debug!("poll cycle cancelled by shutdown");
                        break;
                    }
                    _ = poller.poll_once() => {}
                }
            }

            info!("poller stopped");
        });

        PollerHandle {
            poller: self.clone(),
            shutdown,
            refresh,
            join: Some(join),
        }
    }
}

/// Handle to a running poll loop.
///
/// Dropping the handle aborts the loop; [`PollerHandle::stop`] waits for it.
pub struct PollerHandle {
    poller: Poller,
    shutdown: Arc<Notify>,
    refresh: Arc<Notify>,
    join: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn stats(&self) -> PollerStats {
        self.poller.stats()
    }

    /// Start a cycle without waiting for the next tick.
    pub fn refresh_now(&self) {
        self.refresh.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.join.as_ref().is_some_and(|j| !j.is_finished())
    }

    /// Signal shutdown and wait for the loop to exit. No store write happens
    /// after this returns.
    pub async fn stop(mut self) {
        self.shutdown.notify_one();
        if let Some(join) = self.join.take() {
            if let Err(err) = join.await {
                warn!(error = %err, "poller task ended abnormally");
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryJobsApi;
    use ironqueue_core::Job;

    fn job(id: i64, status: JobStatus) -> Job {
        Job {
            status,
            ..Job::queued(JobId::new(id), format!("type-{id}"), None, 3, Utc::now())
        }
    }

    fn backend() -> Arc<InMemoryJobsApi> {
        Arc::new(InMemoryJobsApi::with_jobs([
            job(101, JobStatus::Queued),
            job(102, JobStatus::Running),
            job(103, JobStatus::Completed),
            job(104, JobStatus::Failed),
        ]))
    }

    fn poller(api: &Arc<InMemoryJobsApi>, store: &JobStore, config: PollerConfig) -> Poller {
        Poller::new(api.clone(), store.clone(), config)
    }

    async fn wait_for(mut cond: impl FnMut() -> bool) {
        for _ in 0..100 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn partitioned_cycle_requests_each_status_and_merges_once() {
        let api = backend();
        let store = JobStore::new();
        let poller = poller(&api, &store, PollerConfig::default());

        let PollOutcome::Applied(report) = poller.poll_once().await else {
            panic!("expected the snapshot to be applied");
        };
        assert_eq!(report.inserted, 4);
        assert_eq!(api.calls().list, 4);
        assert_eq!(store.revision(), 1);
        let ids: Vec<i64> = store.jobs().iter().map(|j| j.id.get()).collect();
        assert_eq!(ids, vec![104, 103, 102, 101]);
    }

    #[tokio::test]
    async fn partitioned_scope_leaves_unpolled_statuses_alone() {
        let api = backend();
        api.put(job(7, JobStatus::Other("PAUSED".into())));
        let store = JobStore::new();
        store.replace_snapshot(Snapshot::full(vec![job(7, JobStatus::Other("PAUSED".into()))]));

        poller(&api, &store, PollerConfig::default()).poll_once().await;

        let paused = store.entry(JobId::new(7)).unwrap();
        assert!(!paused.stale);
        assert_eq!(store.len(), 5);
    }

    #[tokio::test]
    async fn all_scope_issues_a_single_request() {
        let api = backend();
        let store = JobStore::new();
        let config = PollerConfig::default().with_scope(PollScope::All);

        poller(&api, &store, config).poll_once().await;

        assert_eq!(api.calls().list, 1);
        assert_eq!(store.len(), 4);
    }

    #[tokio::test]
    async fn failed_cycle_keeps_previous_data() {
        let api = backend();
        let store = JobStore::new();
        let poller = poller(&api, &store, PollerConfig::default());
        poller.poll_once().await;
        let before = store.entries();

        api.fail_with(Some(TransportError::Api(500, "boom".into())));
        let outcome = poller.poll_once().await;

        assert_eq!(outcome, PollOutcome::Failed(TransportError::Api(500, "boom".into())));
        assert_eq!(store.entries(), before);

        let stats = poller.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.consecutive_failures, 1);
        assert!(stats.last_error.unwrap().contains("boom"));

        api.fail_with(None);
        poller.poll_once().await;
        assert_eq!(poller.stats().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn overlapping_cycle_is_skipped() {
        let api = backend();
        api.set_latency(Duration::from_millis(100));
        let store = JobStore::new();
        let poller = poller(&api, &store, PollerConfig::default());
        let second = poller.clone();

        let (first, skipped) = tokio::join!(poller.poll_once(), async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            second.poll_once().await
        });

        assert!(matches!(first, PollOutcome::Applied(_)));
        assert_eq!(skipped, PollOutcome::Skipped);
        assert_eq!(api.calls().list, 4);
        assert_eq!(poller.stats().skipped, 1);
    }

    #[tokio::test]
    async fn slow_cycle_times_out_without_writing() {
        let api = backend();
        api.set_latency(Duration::from_millis(300));
        let store = JobStore::new();
        let config = PollerConfig::default().with_cycle_timeout(Duration::from_millis(50));
        let poller = poller(&api, &store, config);

        let outcome = poller.poll_once().await;

        assert_eq!(outcome, PollOutcome::Failed(TransportError::Timeout(Duration::from_millis(50))));
        assert!(store.is_empty());

        // The in-flight flag was released by the timed-out cycle.
        api.set_latency(Duration::ZERO);
        assert!(matches!(poller.poll_once().await, PollOutcome::Applied(_)));
    }

    #[tokio::test]
    async fn loop_polls_until_stopped() {
        let api = backend();
        let store = JobStore::new();
        let config = PollerConfig::default().with_interval(Duration::from_millis(20));
        let handle = poller(&api, &store, config).start();

        wait_for(|| handle.stats().applied >= 2).await;
        assert!(handle.is_running());
        handle.stop().await;

        let revision = store.revision();
        api.put(job(200, JobStatus::Queued));
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(store.revision(), revision);
        assert!(store.get(JobId::new(200)).is_none());
    }

    #[tokio::test]
    async fn stop_cancels_a_cycle_in_flight() {
        let api = backend();
        api.set_latency(Duration::from_millis(200));
        let store = JobStore::new();
        let handle = poller(&api, &store, PollerConfig::default()).start();

        wait_for(|| api.calls().list > 0).await;
        handle.stop().await;

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(store.is_empty());
        assert_eq!(store.revision(), 0);
    }

    #[tokio::test]
    async fn refresh_now_runs_a_cycle_before_the_next_tick() {
        let api = backend();
        let store = JobStore::new();
        let config = PollerConfig::default().with_interval(Duration::from_secs(60));
        let handle = poller(&api, &store, config).start();

        wait_for(|| handle.stats().applied == 1).await;
        api.put(job(200, JobStatus::Queued));
        handle.refresh_now();

        wait_for(|| store.get(JobId::new(200)).is_some()).await;
        handle.stop().await;
    }
}
