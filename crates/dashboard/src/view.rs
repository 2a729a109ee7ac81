//! Derived views: per-status counts and the filtered job list.
//!
//! Everything here is a pure function of (jobs, query, status filter).

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::str::FromStr;
use std::sync::Arc;

use ironqueue_core::{Job, JobStatus};
use serde::Serialize;

use crate::store::JobStore;

/// Status predicate applied on top of the text query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum StatusFilter {
    #[default]
    All,
    Only(JobStatus),
}

impl StatusFilter {
    pub fn matches(&self, status: &JobStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => wanted == status,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = Infallible;

    /// `ALL` (any case) or empty disables the predicate. Known status names
    /// are matched case-insensitively; anything else is kept verbatim.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            return Ok(StatusFilter::All);
        }
        Ok(StatusFilter::Only(parse_status(s)))
    }
}

/// Parse a status name, upper-casing the known ones.
pub fn parse_status(s: &str) -> JobStatus {
    match JobStatus::from(s.to_ascii_uppercase()) {
        JobStatus::Other(_) => JobStatus::Other(s.to_string()),
        known => known,
    }
}

/// Number of jobs per status over the whole store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    /// Statuses outside the known four, keyed by their raw value.
    pub other: BTreeMap<String, usize>,
}

impl StatusCounts {
    pub fn from_jobs<'a>(jobs: impl IntoIterator<Item = &'a Job>) -> Self {
        let mut counts = Self::default();
        for job in jobs {
            match &job.status {
                JobStatus::Queued => counts.queued += 1,
                JobStatus::Running => counts.running += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
                JobStatus::Other(raw) => *counts.other.entry(raw.clone()).or_default() += 1,
            }
        }
        counts
    }

    pub fn get(&self, status: &JobStatus) -> usize {
        match status {
            JobStatus::Queued => self.queued,
            JobStatus::Running => self.running,
            JobStatus::Completed => self.completed,
            JobStatus::Failed => self.failed,
            JobStatus::Other(raw) => self.other.get(raw).copied().unwrap_or(0),
        }
    }

    /// The four known statuses with their counts, in display order.
    pub fn known(&self) -> [(JobStatus, usize); 4] {
        JobStatus::KNOWN.map(|status| {
            let n = self.get(&status);
            (status, n)
        })
    }

    pub fn total(&self) -> usize {
        self.queued + self.running + self.completed + self.failed + self.other.values().sum::<usize>()
    }
}

/// Trimmed, lower-cased form of a search query.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Match an already-normalized query against a job's id and type.
pub fn matches_query(job: &Job, normalized: &str) -> bool {
    normalized.is_empty()
        || job.id.to_string().contains(normalized)
        || job.job_type.to_lowercase().contains(normalized)
}

/// Counts plus the rows to display.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobView {
    pub counts: StatusCounts,
    pub rows: Vec<Job>,
}

/// Derive the view for `jobs` (already in display order).
///
/// Counts always cover every job; only `rows` is filtered.
pub fn derive_view(jobs: &[Job], query: &str, filter: &StatusFilter) -> JobView {
    let q = normalize_query(query);
    JobView {
        counts: StatusCounts::from_jobs(jobs),
        rows: jobs
            .iter()
            .filter(|j| filter.matches(&j.status) && matches_query(j, &q))
            .cloned()
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ViewKey {
    revision: u64,
    query: String,
    filter: StatusFilter,
}

/// Caches the last derived view, keyed on (store revision, query, filter).
#[derive(Debug, Default)]
pub struct ViewMemo {
    last: Option<(ViewKey, Arc<JobView>)>,
    derivations: u64,
}

impl ViewMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&mut self, store: &JobStore, query: &str, filter: &StatusFilter) -> Arc<JobView> {
        let query = normalize_query(query);

        if let Some((key, view)) = &self.last {
            if key.revision == store.revision() && key.query == query && &key.filter == filter {
                return Arc::clone(view);
            }
        }

        let (revision, jobs) = store.versioned_jobs();
        let view = Arc::new(derive_view(&jobs, &query, filter));
        self.derivations += 1;
        self.last = Some((
            ViewKey {
                revision,
                query,
                filter: filter.clone(),
            },
            Arc::clone(&view),
        ));
        view
    }

    /// How many times a view was actually recomputed.
    pub fn derivations(&self) -> u64 {
        self.derivations
    }
}
