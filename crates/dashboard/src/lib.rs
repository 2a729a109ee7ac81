//! Client-side synchronization engine for the IronQueue job dashboard.
//!
//! Components:
//! - `store`: local job collection reconciled from polls and submissions
//! - `poller`: periodic snapshot refresh with non-overlapping cycles
//! - `view`: per-status counts and the filtered list
//! - `detail`: on-demand loading of the selected job
//! - `submission`: optimistic job creation
//! - `session`: lifecycle wiring of all of the above

pub mod client;
pub mod config;
pub mod detail;
pub mod display;
pub mod error;
pub mod poller;
pub mod render;
pub mod session;
pub mod store;
pub mod submission;
pub mod view;

pub use client::{HttpJobsApi, InMemoryJobsApi, JobsApi};
pub use config::{ConfigError, DashboardConfig};
pub use detail::{DetailView, JobDetailLoader};
pub use error::{SessionError, SubmitError, TransportError};
pub use poller::{PollOutcome, PollScope, Poller, PollerConfig, PollerHandle, PollerStats};
pub use session::DashboardSession;
pub use store::{Coverage, JobStore, MergeReport, Origin, Snapshot, StoreEntry};
pub use submission::SubmissionController;
pub use view::{JobView, StatusCounts, StatusFilter, ViewMemo, derive_view};
