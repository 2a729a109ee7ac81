//! Detail panel for the selected job.
//!
//! A selection is served from the store when the stored record is complete.
//! Otherwise the job is fetched, and the response is applied only if the
//! selection has not moved on in the meantime.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ironqueue_core::{Job, JobId};
use tokio::sync::watch;
use tracing::debug;

use crate::client::JobsApi;
use crate::error::TransportError;
use crate::store::JobStore;

/// What the detail panel currently shows.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DetailView {
    #[default]
    Idle,
    Loading(JobId),
    Ready(Job),
    NotFound(JobId),
    Failed { id: JobId, error: TransportError },
}

impl DetailView {
    /// The job id this view is about, if any.
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            DetailView::Idle => None,
            DetailView::Loading(id) | DetailView::NotFound(id) => Some(*id),
            DetailView::Ready(job) => Some(job.id),
            DetailView::Failed { id, .. } => Some(*id),
        }
    }
}

/// The selected id plus a counter bumped on every `select` and `clear`, so a
/// response for an earlier selection of the same id is still told apart.
#[derive(Debug, Default)]
struct Selection {
    id: Option<JobId>,
    generation: u64,
}

impl Selection {
    fn replace(&mut self, id: Option<JobId>) -> u64 {
        self.id = id;
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }
}

#[derive(Clone)]
pub struct JobDetailLoader {
    api: Arc<dyn JobsApi>,
    store: JobStore,
    selection: Arc<Mutex<Selection>>,
    view_tx: Arc<watch::Sender<DetailView>>,
}

impl JobDetailLoader {
    pub fn new(api: Arc<dyn JobsApi>, store: JobStore) -> Self {
        let (view_tx, _) = watch::channel(DetailView::Idle);
        Self {
            api,
            store,
            selection: Arc::new(Mutex::new(Selection::default())),
            view_tx: Arc::new(view_tx),
        }
    }

    fn lock_selection(&self) -> MutexGuard<'_, Selection> {
        self.selection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn selected(&self) -> Option<JobId> {
        self.lock_selection().id
    }

    pub fn current(&self) -> DetailView {
        self.view_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DetailView> {
        self.view_tx.subscribe()
    }

    /// Change the selection and load its details.
    ///
    /// Returns the view this call resolved to. If the selection changed while
    /// the fetch was in flight, that view is not published.
    pub async fn select(&self, id: Option<JobId>) -> DetailView {
        let Some(id) = id else {
            self.clear();
            return DetailView::Idle;
        };

        let generation = {
            let mut selection = self.lock_selection();
            let generation = selection.replace(Some(id));

            if let Some(view) = self.from_store(id) {
                self.view_tx.send_replace(view.clone());
                return view;
            }
            self.view_tx.send_replace(DetailView::Loading(id));
            generation
        };

        let view = match self.api.get_job(id).await {
            Ok(Some(job)) => DetailView::Ready(job),
            Ok(None) => DetailView::NotFound(id),
            Err(error) => DetailView::Failed { id, error },
        };

        if !self.apply_if_current(id, generation, view.clone()) {
            debug!(job_id = %id, "selection changed; discarding detail response");
        }
        view
    }

    /// Load the current selection again.
    pub async fn reload(&self) -> DetailView {
        let selected = self.selected();
        self.select(selected).await
    }

    pub fn clear(&self) {
        let mut selection = self.lock_selection();
        selection.replace(None);
        self.view_tx.send_replace(DetailView::Idle);
    }

    /// Stored records that can be shown without a fetch.
    ///
    /// Provisional ids are unknown to the backend, so they never hit the
    /// network: either the store has them or they are gone.
    fn from_store(&self, id: JobId) -> Option<DetailView> {
        match self.store.get(id) {
            Some(job) if job.is_complete() || id.is_provisional() => Some(DetailView::Ready(job)),
            None if id.is_provisional() => Some(DetailView::NotFound(id)),
            _ => None,
        }
    }

    fn apply_if_current(&self, id: JobId, generation: u64, view: DetailView) -> bool {
        let selection = self.lock_selection();
        if selection.id != Some(id) || selection.generation != generation {
            return false;
        }
        self.view_tx.send_replace(view);
        true
    }
}
