//! Presentation helpers shared by every renderer.

use chrono::Duration;
use ironqueue_core::{Job, JobStatus};
use serde_json::Value;

/// Shown in place of the table when no row passes the filters.
pub const EMPTY_LIST_MESSAGE: &str = "No jobs match your filters.";

/// Shown when a duration cannot be computed.
pub const NO_DURATION: &str = "—";

/// Visual weight of a status badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Neutral,
    Info,
    Success,
    Danger,
}

impl From<&JobStatus> for StatusTone {
    fn from(status: &JobStatus) -> Self {
        match status {
            JobStatus::Queued => StatusTone::Neutral,
            JobStatus::Running => StatusTone::Info,
            JobStatus::Completed => StatusTone::Success,
            // Unknown statuses get the loudest tone.
            JobStatus::Failed | JobStatus::Other(_) => StatusTone::Danger,
        }
    }
}

impl StatusTone {
    pub fn symbol(self) -> char {
        match self {
            StatusTone::Neutral => '·',
            StatusTone::Info => '▶',
            StatusTone::Success => '✔',
            StatusTone::Danger => '✖',
        }
    }
}

/// Most retry slots drawn for one job; the rest is summarized as `+N`.
pub const MAX_RETRY_SLOTS: u32 = 10;

/// One slot per allowed attempt, `true` for each attempt already used.
///
/// `attempts > max_attempts` is clamped here for display only. At most
/// [`MAX_RETRY_SLOTS`] slots are returned.
pub fn retry_slots(attempts: u32, max_attempts: u32) -> Vec<bool> {
    let used = attempts.min(max_attempts);
    (0..max_attempts.min(MAX_RETRY_SLOTS)).map(|i| i < used).collect()
}

pub fn retry_dots(job: &Job) -> String {
    let mut dots: String = retry_slots(job.attempts, job.max_attempts)
        .into_iter()
        .map(|used| if used { '●' } else { '○' })
        .collect();
    if job.max_attempts > MAX_RETRY_SLOTS {
        dots.push_str(&format!("+{}", job.max_attempts - MAX_RETRY_SLOTS));
    }
    dots
}

/// `"email-send · attempts 1/3"`
pub fn attempts_label(job: &Job) -> String {
    format!(
        "{} · attempts {}/{}",
        job.job_type,
        job.attempts.min(job.max_attempts),
        job.max_attempts
    )
}

/// Payload as indented JSON; an absent payload renders as `{}`.
pub fn pretty_payload(payload: Option<&Value>) -> String {
    match payload {
        Some(value) => serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
        None => "{}".to_string(),
    }
}

/// Run time of a job, or [`NO_DURATION`] until the backend reports both ends.
pub fn duration_label(job: &Job) -> String {
    match (job.started_at, job.finished_at) {
        (Some(started), Some(finished)) if finished >= started => format_duration(finished - started),
        _ => NO_DURATION.to_string(),
    }
}

fn format_duration(d: Duration) -> String {
    let total_ms = d.num_milliseconds();
    if total_ms < 1_000 {
        return format!("{total_ms}ms");
    }
    let secs = d.num_seconds();
    if secs < 60 {
        return format!("{:.1}s", total_ms as f64 / 1_000.0);
    }
    if secs < 3_600 {
        return format!("{}m {:02}s", secs / 60, secs % 60);
    }
    format!("{}h {:02}m", secs / 3_600, (secs % 3_600) / 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ironqueue_core::JobId;
    use serde_json::json;

    fn job(attempts: u32, max_attempts: u32) -> Job {
        Job {
            attempts,
            ..Job::queued(JobId::new(1), "email-send", None, max_attempts, Utc::now())
        }
    }

    #[test]
    fn retry_slots_mark_used_attempts() {
        assert_eq!(retry_slots(1, 3), vec![true, false, false]);
        assert_eq!(retry_slots(0, 2), vec![false, false]);
        assert!(retry_slots(0, 0).is_empty());
    }

    #[test]
    fn attempts_over_max_are_clamped_for_display() {
        assert_eq!(retry_slots(9, 3), vec![true, true, true]);
        assert_eq!(retry_dots(&job(9, 3)), "●●●");
        assert_eq!(attempts_label(&job(9, 3)), "email-send · attempts 3/3");
    }

    #[test]
    fn huge_max_attempts_draws_a_bounded_row() {
        let slots = retry_slots(2, 4_000_000_000);
        assert_eq!(slots.len(), MAX_RETRY_SLOTS as usize);
        assert_eq!(slots.iter().filter(|used| **used).count(), 2);

        assert_eq!(retry_dots(&job(2, 4_000_000_000)), "●●○○○○○○○○+3999999990");
        assert_eq!(retry_dots(&job(12, 12)), "●●●●●●●●●●+2");
        assert_eq!(retry_dots(&job(0, MAX_RETRY_SLOTS)), "○".repeat(10));
    }

    #[test]
    fn tones_follow_status() {
        assert_eq!(StatusTone::from(&JobStatus::Queued), StatusTone::Neutral);
        assert_eq!(StatusTone::from(&JobStatus::Running), StatusTone::Info);
        assert_eq!(StatusTone::from(&JobStatus::Completed), StatusTone::Success);
        assert_eq!(StatusTone::from(&JobStatus::Failed), StatusTone::Danger);
        assert_eq!(StatusTone::from(&JobStatus::Other("PAUSED".into())), StatusTone::Danger);
    }

    #[test]
    fn payload_is_pretty_printed() {
        assert_eq!(pretty_payload(None), "{}");
        assert_eq!(
            pretty_payload(Some(&json!({ "to": "ops" }))),
            "{\n  \"to\": \"ops\"\n}"
        );
    }

    #[test]
    fn duration_needs_both_timestamps() {
        let mut j = job(1, 3);
        assert_eq!(duration_label(&j), NO_DURATION);

        j.started_at = Some(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
        assert_eq!(duration_label(&j), NO_DURATION);

        j.finished_at = Some(Utc.with_ymd_and_hms(2024, 1, 1, 10, 2, 5).unwrap());
        assert_eq!(duration_label(&j), "2m 05s");

        j.finished_at = Some(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap());
        assert_eq!(duration_label(&j), NO_DURATION);
    }
}
