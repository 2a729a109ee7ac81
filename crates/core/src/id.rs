//! Strongly-typed identifiers.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a job record.
///
/// Backend ids are positive. Ids handed out for optimistic records are
/// negative, so the two spaces never collide within a session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(i64);

impl JobId {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// The `n`-th provisional id (1-based): `-1, -2, ...`.
    pub const fn provisional(n: u64) -> Self {
        Self(-(n as i64))
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    pub const fn is_provisional(self) -> bool {
        self.0 < 0
    }
}

impl core::fmt::Display for JobId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<i64> for JobId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl FromStr for JobId {
    type Err = core::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Correlation id of one operator submission.
///
/// Uses UUIDv7 (time-ordered) so log lines sort by submission time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(Uuid);

impl SubmissionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SubmissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provisional_ids_are_negative_and_distinct() {
        assert_eq!(JobId::provisional(1), JobId::new(-1));
        assert_eq!(JobId::provisional(7).get(), -7);
        assert!(JobId::provisional(1).is_provisional());
        assert!(!JobId::new(1).is_provisional());
        assert!(!JobId::new(0).is_provisional());
    }

    #[test]
    fn parses_and_displays_decimal() {
        let id: JobId = " 101 ".parse().unwrap();
        assert_eq!(id, JobId::new(101));
        assert_eq!(id.to_string(), "101");
        assert!("abc".parse::<JobId>().is_err());
    }

    #[test]
    fn serializes_transparently() {
        assert_eq!(serde_json::to_string(&JobId::new(42)).unwrap(), "42");
        let id: JobId = serde_json::from_str("42").unwrap();
        assert_eq!(id.get(), 42);
    }
}
