//! Job records in the backend's wire shape.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::id::JobId;

/// Execution state reported by the backend.
///
/// The set is open: a status this client does not know is kept verbatim in
/// [`JobStatus::Other`] and rendered as-is, never rejected.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Other(String),
}

impl JobStatus {
    /// The four statuses the backend is known to report, in display order.
    pub const KNOWN: [JobStatus; 4] = [
        JobStatus::Queued,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Other(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, JobStatus::Other(_))
    }
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "QUEUED" => JobStatus::Queued,
            "RUNNING" => JobStatus::Running,
            "COMPLETED" => JobStatus::Completed,
            "FAILED" => JobStatus::Failed,
            _ => JobStatus::Other(value),
        }
    }
}

impl From<&str> for JobStatus {
    fn from(value: &str) -> Self {
        JobStatus::from(value.to_string())
    }
}

impl From<JobStatus> for String {
    fn from(value: JobStatus) -> Self {
        match value {
            JobStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_max_attempts() -> u32 {
    1
}

/// Offset-less timestamps the backend is known to emit, read as UTC.
const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Timestamps are display-only, so one the client cannot read becomes `None`
/// instead of rejecting the whole record.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(raw)) => raw,
        _ => return Ok(None),
    };
    let raw = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }
    Ok(NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc()))
}

/// A job as reported by `GET /jobs` and `GET /jobs/{id}`.
///
/// Records are only ever replaced wholesale; nothing in the dashboard patches
/// individual fields of a backend-sourced job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    #[serde(rename = "type", default)]
    pub job_type: String,
    pub status: JobStatus,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// A freshly queued job that has not run yet.
    pub fn queued(
        id: JobId,
        job_type: impl Into<String>,
        payload: Option<Value>,
        max_attempts: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            job_type: job_type.into(),
            status: JobStatus::Queued,
            attempts: 0,
            max_attempts,
            payload,
            last_error: None,
            created_at: Some(created_at),
            started_at: None,
            finished_at: None,
        }
    }

    /// Whether this record carries everything the detail panel shows.
    ///
    /// List endpoints may omit the payload; a point fetch always includes it.
    pub fn is_complete(&self) -> bool {
        self.payload.is_some()
    }

    /// A copy of this job marked `FAILED` with the given error.
    pub fn failed_with(&self, error: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            last_error: Some(error.into()),
            ..self.clone()
        }
    }
}

/// Body of `POST /jobs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJob {
    #[serde(rename = "type")]
    pub job_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl NewJob {
    pub fn new(job_type: impl Into<String>) -> Self {
        Self {
            job_type: job_type.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Check the minimal shape and return the normalized request.
    ///
    /// The type is trimmed and a `null` payload is treated as absent.
    pub fn validated(self) -> Result<NewJob, ValidationError> {
        let job_type = self.job_type.trim();
        if job_type.is_empty() {
            return Err(ValidationError::EmptyType);
        }

        let payload = match self.payload {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(Value::Object(map)),
            Some(other) => return Err(ValidationError::PayloadNotObject(json_kind(&other))),
        };

        Ok(NewJob {
            job_type: job_type.to_string(),
            payload,
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_backend_shape_without_timestamps() {
        let job: Job = serde_json::from_value(json!({
            "id": 101,
            "type": "email-send",
            "status": "RUNNING",
            "attempts": 1,
            "max_attempts": 3,
            "payload": { "to": "ops@example.com" },
            "last_error": null
        }))
        .unwrap();

        assert_eq!(job.id, JobId::new(101));
        assert_eq!(job.job_type, "email-send");
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.max_attempts, 3);
        assert!(job.last_error.is_none());
        assert!(job.created_at.is_none());
        assert!(job.is_complete());
    }

    #[test]
    fn unknown_status_is_preserved_verbatim() {
        let job: Job = serde_json::from_value(json!({
            "id": 7,
            "type": "x",
            "status": "PAUSED",
            "attempts": 0,
            "max_attempts": 1
        }))
        .unwrap();

        assert_eq!(job.status, JobStatus::Other("PAUSED".to_string()));
        assert!(!job.status.is_known());

        let back = serde_json::to_value(&job).unwrap();
        assert_eq!(back["status"], "PAUSED");
        assert_eq!(back["type"], "x");
    }

    #[test]
    fn known_statuses_round_trip_as_upper_case_strings() {
        for status in JobStatus::KNOWN {
            let encoded = serde_json::to_value(&status).unwrap();
            assert_eq!(encoded, json!(status.as_str()));
            let decoded: JobStatus = serde_json::from_value(encoded).unwrap();
            assert_eq!(decoded, status);
        }
    }

    #[test]
    fn missing_payload_means_incomplete() {
        let job: Job = serde_json::from_value(json!({
            "id": 1, "type": "t", "status": "QUEUED", "attempts": 0, "max_attempts": 2
        }))
        .unwrap();
        assert!(!job.is_complete());
    }

    #[test]
    fn naive_timestamps_are_read_as_utc() {
        let job: Job = serde_json::from_value(json!({
            "id": 1, "type": "t", "status": "QUEUED", "attempts": 0, "max_attempts": 3,
            "created_at": "2024-01-01T10:00:00.123456",
            "started_at": "2024-01-01 10:00:05",
            "finished_at": "2024-01-01T10:00:07Z"
        }))
        .unwrap();

        let created = job.created_at.unwrap();
        assert_eq!(created.to_rfc3339(), "2024-01-01T10:00:00.123456+00:00");
        assert_eq!((job.started_at.unwrap() - created).num_milliseconds(), 4_876);
        assert_eq!((job.finished_at.unwrap() - created).num_milliseconds(), 6_876);
    }

    #[test]
    fn unreadable_timestamps_do_not_reject_the_job() {
        let job: Job = serde_json::from_value(json!({
            "id": 2, "type": "t", "status": "RUNNING", "attempts": 1, "max_attempts": 3,
            "created_at": "yesterday",
            "started_at": 1704103200,
            "finished_at": null
        }))
        .unwrap();

        assert_eq!(job.id, JobId::new(2));
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.created_at.is_none());
        assert!(job.started_at.is_none());
        assert!(job.finished_at.is_none());
    }

    #[test]
    fn failed_with_keeps_identity() {
        let job = Job::queued(JobId::new(-1), "report", None, 3, Utc::now());
        let failed = job.failed_with("boom");
        assert_eq!(failed.id, job.id);
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.last_error.as_deref(), Some("boom"));
        assert_eq!(failed.created_at, job.created_at);
    }

    #[test]
    fn new_job_validation() {
        assert_eq!(
            NewJob::new("   ").validated(),
            Err(ValidationError::EmptyType)
        );
        assert_eq!(
            NewJob::new("x").with_payload(json!([1, 2])).validated(),
            Err(ValidationError::PayloadNotObject("array"))
        );

        let ok = NewJob::new("  email-send ")
            .with_payload(json!({ "to": "a@b" }))
            .validated()
            .unwrap();
        assert_eq!(ok.job_type, "email-send");
        assert_eq!(ok.payload, Some(json!({ "to": "a@b" })));

        let null_payload = NewJob::new("x").with_payload(Value::Null).validated().unwrap();
        assert!(null_payload.payload.is_none());
    }

    #[test]
    fn new_job_body_omits_absent_payload() {
        let body = serde_json::to_value(NewJob::new("email-send")).unwrap();
        assert_eq!(body, json!({ "type": "email-send" }));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: whatever status string the backend sends comes back out unchanged.
            #[test]
            fn any_status_string_is_preserved(raw in "[A-Za-z_]{1,16}") {
                let status: JobStatus = serde_json::from_value(json!(raw.clone())).unwrap();
                prop_assert_eq!(status.as_str(), raw.as_str());
                prop_assert_eq!(status.is_known(), JobStatus::KNOWN.iter().any(|k| k.as_str() == raw));
            }
        }
    }
}
