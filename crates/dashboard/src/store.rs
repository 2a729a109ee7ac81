//! Local view of every known job, reconciled from two writers.
//!
//! The poller feeds authoritative snapshots; the submission controller feeds
//! optimistic records. Rules:
//! - a snapshot replaces every job it names (server wins once it knows an id)
//! - a job missing from a later snapshot is kept and flagged stale, never dropped
//! - provisional rows survive snapshots until their submission is confirmed
//!
//! Writes are synchronous and serialized by one lock; nothing suspends while
//! the lock is held.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ironqueue_core::{Job, JobId, JobStatus, ReconciliationConflict, SubmissionId};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Who last wrote a store entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Reported by the backend (snapshot or creation response).
    Server,
    /// Created locally, not yet confirmed by the backend.
    Provisional { submission: SubmissionId },
}

/// A job plus the bookkeeping the store keeps about it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEntry {
    pub job: Job,
    pub origin: Origin,
    /// Absent from the most recent snapshot that covered its status.
    pub stale: bool,
}

impl StoreEntry {
    pub fn is_provisional(&self) -> bool {
        matches!(self.origin, Origin::Provisional { .. })
    }
}

/// Which statuses a snapshot speaks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Coverage {
    /// `GET /jobs`: every job the backend has.
    All,
    /// One or more `GET /jobs?status=` partitions merged client-side.
    Statuses(BTreeSet<JobStatus>),
}

impl Coverage {
    pub fn covers(&self, status: &JobStatus) -> bool {
        match self {
            Coverage::All => true,
            Coverage::Statuses(statuses) => statuses.contains(status),
        }
    }
}

/// An authoritative job list fetched at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub coverage: Coverage,
    pub jobs: Vec<Job>,
}

impl Snapshot {
    pub fn full(jobs: Vec<Job>) -> Self {
        Self {
            coverage: Coverage::All,
            jobs,
        }
    }

    pub fn partial(statuses: impl IntoIterator<Item = JobStatus>, jobs: Vec<Job>) -> Self {
        Self {
            coverage: Coverage::Statuses(statuses.into_iter().collect()),
            jobs,
        }
    }
}

/// What one `replace_snapshot` call changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub marked_stale: usize,
    /// Provisional rows replaced because the snapshot named their id.
    pub superseded_provisional: usize,
}

impl MergeReport {
    pub fn changed(&self) -> bool {
        self.inserted + self.updated + self.marked_stale > 0
    }
}

#[derive(Debug, Default)]
struct StoreState {
    entries: BTreeMap<JobId, StoreEntry>,
    revision: u64,
    closed: bool,
}

/// Shared handle to the job store.
///
/// Cheap to clone; all clones see the same state.
#[derive(Debug, Clone)]
pub struct JobStore {
    state: Arc<RwLock<StoreState>>,
    revision_tx: Arc<watch::Sender<u64>>,
}

impl JobStore {
    pub fn new() -> Self {
        let (revision_tx, _) = watch::channel(0);
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            revision_tx: Arc::new(revision_tx),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bump the revision and notify subscribers. Called with the write lock
    /// held so revisions are published in order.
    fn bump(&self, state: &mut StoreState) {
        state.revision += 1;
        self.revision_tx.send_replace(state.revision);
    }

    /// Merge an authoritative snapshot.
    pub fn replace_snapshot(&self, snapshot: Snapshot) -> MergeReport {
        let mut guard = self.write();
        let state = &mut *guard;
        let mut report = MergeReport::default();

        if state.closed {
            debug!(jobs = snapshot.jobs.len(), "store closed; snapshot dropped");
            return report;
        }

        let mut named = BTreeSet::new();
        for job in snapshot.jobs {
            let id = job.id;
            named.insert(id);

            match state.entries.get_mut(&id) {
                Some(entry)
                    if entry.origin == Origin::Server && !entry.stale && entry.job == job =>
                {
                    report.unchanged += 1;
                }
                Some(entry) => {
                    if entry.is_provisional() {
                        report.superseded_provisional += 1;
                    }
                    entry.job = job;
                    entry.origin = Origin::Server;
                    entry.stale = false;
                    report.updated += 1;
                }
                None => {
                    state.entries.insert(
                        id,
                        StoreEntry {
                            job,
                            origin: Origin::Server,
                            stale: false,
                        },
                    );
                    report.inserted += 1;
                }
            }
        }

        for (id, entry) in state.entries.iter_mut() {
            if named.contains(id) || entry.stale || entry.is_provisional() {
                continue;
            }
            if snapshot.coverage.covers(&entry.job.status) {
                entry.stale = true;
                report.marked_stale += 1;
            }
        }

        if report.changed() {
            self.bump(state);
        }

        debug!(
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.unchanged,
            marked_stale = report.marked_stale,
            revision = state.revision,
            "snapshot merged"
        );

        report
    }

    /// Record a job the backend has not confirmed yet.
    ///
    /// Refused when the id already belongs to a backend-sourced row.
    pub fn upsert_optimistic(
        &self,
        job: Job,
        submission: SubmissionId,
    ) -> Result<(), ReconciliationConflict> {
        let mut state = self.write();
        if state.closed {
            debug!(job_id = %job.id, "store closed; optimistic write dropped");
            return Err(ReconciliationConflict::Closed);
        }

        if let Some(existing) = state.entries.get(&job.id) {
            if existing.origin == Origin::Server {
                warn!(job_id = %job.id, %submission, "optimistic write targets a server-owned id");
                return Err(ReconciliationConflict::ServerOwned(job.id));
            }
        }

        state.entries.insert(
            job.id,
            StoreEntry {
                job,
                origin: Origin::Provisional { submission },
                stale: false,
            },
        );
        self.bump(&mut state);
        Ok(())
    }

    /// Swap a provisional row for the backend's record of it, in one write.
    ///
    /// If a snapshot already delivered the authoritative id, that row is kept
    /// and the provisional row is simply removed. When the provisional row is
    /// gone already, the authoritative job is still recorded and
    /// [`ReconciliationConflict::MissingProvisional`] is returned.
    pub fn confirm_provisional(
        &self,
        provisional_id: JobId,
        authoritative: Job,
    ) -> Result<(), ReconciliationConflict> {
        let mut state = self.write();
        if state.closed {
            debug!(%provisional_id, "store closed; confirmation dropped");
            return Err(ReconciliationConflict::Closed);
        }

        let had_provisional = state
            .entries
            .get(&provisional_id)
            .is_some_and(StoreEntry::is_provisional);
        if had_provisional {
            state.entries.remove(&provisional_id);
        }

        let known_to_server = state
            .entries
            .get(&authoritative.id)
            .is_some_and(|e| e.origin == Origin::Server && !e.stale);

        if !known_to_server {
            state.entries.insert(
                authoritative.id,
                StoreEntry {
                    job: authoritative,
                    origin: Origin::Server,
                    stale: false,
                },
            );
        }

        if had_provisional || !known_to_server {
            self.bump(&mut state);
        }

        if had_provisional {
            Ok(())
        } else {
            Err(ReconciliationConflict::MissingProvisional(provisional_id))
        }
    }

    /// Mark a provisional row as failed with a synthetic error.
    pub fn fail_provisional(
        &self,
        provisional_id: JobId,
        error: impl Into<String>,
    ) -> Result<(), ReconciliationConflict> {
        let mut state = self.write();
        if state.closed {
            return Err(ReconciliationConflict::Closed);
        }

        let Some(entry) = state
            .entries
            .get_mut(&provisional_id)
            .filter(|e| e.is_provisional())
        else {
            return Err(ReconciliationConflict::MissingProvisional(provisional_id));
        };

        entry.job = entry.job.failed_with(error);
        self.bump(&mut state);
        Ok(())
    }

    pub fn get(&self, id: JobId) -> Option<Job> {
        self.read().entries.get(&id).map(|e| e.job.clone())
    }

    pub fn entry(&self, id: JobId) -> Option<StoreEntry> {
        self.read().entries.get(&id).cloned()
    }

    /// All jobs in display order (see [`display_order`]).
    pub fn jobs(&self) -> Vec<Job> {
        self.versioned_jobs().1
    }

    /// All jobs in display order together with the revision they belong to.
    pub fn versioned_jobs(&self) -> (u64, Vec<Job>) {
        let state = self.read();
        let mut jobs: Vec<Job> = state.entries.values().map(|e| e.job.clone()).collect();
        jobs.sort_by(|a, b| display_order(a.id, b.id));
        (state.revision, jobs)
    }

    pub fn entries(&self) -> Vec<StoreEntry> {
        let state = self.read();
        let mut entries: Vec<StoreEntry> = state.entries.values().cloned().collect();
        entries.sort_by(|a, b| display_order(a.job.id, b.job.id));
        entries
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().entries.is_empty()
    }

    pub fn stale_count(&self) -> usize {
        self.read().entries.values().filter(|e| e.stale).count()
    }

    /// Monotonic counter bumped by every write that changed something.
    pub fn revision(&self) -> u64 {
        self.read().revision
    }

    /// Receive the revision after each effective write.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision_tx.subscribe()
    }

    /// Stop accepting writes. Reads keep working on the last state.
    pub fn close(&self) {
        let mut state = self.write();
        if !state.closed {
            state.closed = true;
            debug!(revision = state.revision, "store closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.read().closed
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Newest first: provisional (negative) ids ahead of backend ids, the most
/// recent submission first, then backend ids descending.
pub fn display_order(a: JobId, b: JobId) -> Ordering {
    match (a.is_provisional(), b.is_provisional()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => a.cmp(&b),
        (false, false) => b.cmp(&a),
    }
}
