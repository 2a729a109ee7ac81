//! Plain-text rendering for the terminal dashboard.

use std::fmt::Write as _;

use ironqueue_core::Job;

use crate::detail::DetailView;
use crate::display::{
    EMPTY_LIST_MESSAGE, StatusTone, attempts_label, duration_label, pretty_payload, retry_dots,
};
use crate::poller::PollerStats;
use crate::view::{JobView, StatusCounts};

/// `QUEUED 2  RUNNING 1  COMPLETED 0  FAILED 0`, followed by any unknown
/// statuses the backend reported.
pub fn render_counts(counts: &StatusCounts) -> String {
    let mut parts: Vec<String> = counts
        .known()
        .iter()
        .map(|(status, n)| format!("{status} {n}"))
        .collect();
    parts.extend(counts.other.iter().map(|(status, n)| format!("{status} {n}")));
    parts.join("  ")
}

pub fn render_row(job: &Job) -> String {
    let tone = StatusTone::from(&job.status);
    format!(
        "{} {:>6}  {:<24} {:<10} {}",
        tone.symbol(),
        job.id.to_string(),
        job.job_type,
        job.status.as_str(),
        retry_dots(job)
    )
}

pub fn render_view(view: &JobView) -> String {
    let mut out = render_counts(&view.counts);
    out.push('\n');

    if view.rows.is_empty() {
        out.push_str(EMPTY_LIST_MESSAGE);
        out.push('\n');
        return out;
    }

    for job in &view.rows {
        out.push_str(&render_row(job));
        out.push('\n');
    }
    out
}

/// The whole `watch` screen: the job table plus, while polls keep failing,
/// a line saying the data shown may be stale.
pub fn render_screen(view: &JobView, stats: &PollerStats) -> String {
    let mut out = render_view(view);
    if let Some(err) = &stats.last_error {
        let _ = writeln!(
            out,
            "\nlast refresh failed ({}x): {err}",
            stats.consecutive_failures
        );
    }
    out
}

pub fn render_detail(view: &DetailView) -> String {
    match view {
        DetailView::Idle => "Select a job to see its details.\n".to_string(),
        DetailView::Loading(id) => format!("Job #{id}\nLoading…\n"),
        DetailView::NotFound(id) => format!("Job #{id} not found.\n"),
        DetailView::Failed { id, error } => format!("Job #{id}\nCould not load details: {error}\n"),
        DetailView::Ready(job) => {
            let mut out = String::new();
            // Writing into a String cannot fail.
            let _ = writeln!(out, "Job #{}  [{}]", job.id, job.status);
            let _ = writeln!(out, "{}", attempts_label(job));
            let _ = writeln!(out, "duration: {}", duration_label(job));
            if let Some(err) = &job.last_error {
                let _ = writeln!(out, "last error: {err}");
            }
            let _ = writeln!(out, "payload:\n{}", pretty_payload(job.payload.as_ref()));
            out
        }
    }
}
