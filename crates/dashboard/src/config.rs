//! Dashboard configuration.
//!
//! Read from `IRONQUEUE_*` environment variables; every value has a default.

use std::time::Duration;

use ironqueue_core::JobStatus;

use crate::poller::{PollScope, PollerConfig};
use crate::view::parse_status;

pub const DEFAULT_API_URL: &str = "http://localhost:8080";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
    #[error("{0}")]
    OutOfRange(&'static str),
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Base URL the `/jobs` endpoints hang off.
    pub api_url: String,
    /// Time between poll cycles.
    pub poll_interval: Duration,
    /// Upper bound for a single HTTP request.
    pub request_timeout: Duration,
    /// Upper bound for a whole poll cycle (all partitions).
    pub cycle_timeout: Duration,
    /// What each poll cycle fetches.
    pub scope: PollScope,
    /// `max_attempts` shown on optimistic rows until the backend answers.
    pub default_max_attempts: u32,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            poll_interval: Duration::from_secs(3),
            request_timeout: Duration::from_secs(5),
            cycle_timeout: Duration::from_secs(10),
            scope: PollScope::default(),
            default_max_attempts: 3,
        }
    }
}

impl DashboardConfig {
    /// Build from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("IRONQUEUE_API_URL") {
            config.api_url = url;
        }
        if let Some(ms) = lookup("IRONQUEUE_POLL_INTERVAL_MS") {
            config.poll_interval = parse_millis("IRONQUEUE_POLL_INTERVAL_MS", &ms)?;
        }
        if let Some(ms) = lookup("IRONQUEUE_REQUEST_TIMEOUT_MS") {
            config.request_timeout = parse_millis("IRONQUEUE_REQUEST_TIMEOUT_MS", &ms)?;
        }
        if let Some(ms) = lookup("IRONQUEUE_CYCLE_TIMEOUT_MS") {
            config.cycle_timeout = parse_millis("IRONQUEUE_CYCLE_TIMEOUT_MS", &ms)?;
        }
        if let Some(scope) = lookup("IRONQUEUE_POLL_SCOPE") {
            config.scope = parse_scope(&scope)?;
        }
        if let Some(n) = lookup("IRONQUEUE_DEFAULT_MAX_ATTEMPTS") {
            config.default_max_attempts = n.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "IRONQUEUE_DEFAULT_MAX_ATTEMPTS",
                value: n.clone(),
                reason: "expected a positive integer",
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
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

    pub fn with_default_max_attempts(mut self, max: u32) -> Self {
        self.default_max_attempts = max;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_url.trim().is_empty() {
            return Err(ConfigError::OutOfRange("api_url must not be empty"));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::OutOfRange("poll_interval must be non-zero"));
        }
        if self.request_timeout.is_zero() || self.cycle_timeout.is_zero() {
            return Err(ConfigError::OutOfRange("timeouts must be non-zero"));
        }
        if let PollScope::Partitioned(statuses) = &self.scope {
            if statuses.is_empty() {
                return Err(ConfigError::OutOfRange("partitioned poll scope needs at least one status"));
            }
        }
        if self.default_max_attempts == 0 {
            return Err(ConfigError::OutOfRange("default_max_attempts must be positive"));
        }
        Ok(())
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval: self.poll_interval,
            cycle_timeout: self.cycle_timeout,
            scope: self.scope.clone(),
        }
    }
}

fn parse_millis(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::Invalid {
            key,
            value: raw.to_string(),
            reason: "expected milliseconds",
        })
}

/// `all`, or a comma-separated list of statuses.
fn parse_scope(raw: &str) -> Result<PollScope, ConfigError> {
    if raw.trim().eq_ignore_ascii_case("all") {
        return Ok(PollScope::All);
    }

    let statuses: Vec<JobStatus> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_status)
        .collect();

    if statuses.is_empty() {
        return Err(ConfigError::Invalid {
            key: "IRONQUEUE_POLL_SCOPE",
            value: raw.to_string(),
            reason: "expected `all` or a comma-separated status list",
        });
    }

    Ok(PollScope::Partitioned(statuses))
}
