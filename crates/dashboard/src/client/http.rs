//! `reqwest`-backed implementation of [`JobsApi`].

use std::time::Duration;

use async_trait::async_trait;
use ironqueue_core::{Job, JobId, JobStatus, NewJob};
use reqwest::StatusCode;

use super::JobsApi;
use crate::error::TransportError;

/// HTTP client for the job backend.
///
/// Every request is bounded by `request_timeout`; a hung backend surfaces as
/// [`TransportError::Timeout`] instead of blocking the caller.
#[derive(Debug, Clone)]
pub struct HttpJobsApi {
    base_url: String,
    request_timeout: Duration,
    http: reqwest::Client,
}

impl HttpJobsApi {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            base_url,
            request_timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn map_send_error(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.request_timeout)
        } else {
            TransportError::Network(err.to_string())
        }
    }

    async fn decode<T>(&self, resp: reqwest::Response) -> Result<T, TransportError>
    where
        T: serde::de::DeserializeOwned,
    {
        resp.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.request_timeout)
            } else {
                TransportError::Parse(e.to_string())
            }
        })
    }
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(TransportError::Api(status.as_u16(), body))
}

#[async_trait]
impl JobsApi for HttpJobsApi {
    async fn list_jobs(&self, status: Option<&JobStatus>) -> Result<Vec<Job>, TransportError> {
        let mut req = self.http.get(self.url("/jobs"));
        if let Some(status) = status {
            req = req.query(&[("status", status.as_str())]);
        }

        let resp = req.send().await.map_err(|e| self.map_send_error(e))?;
        let resp = ensure_success(resp).await?;
        self.decode(resp).await
    }

    async fn get_job(&self, id: JobId) -> Result<Option<Job>, TransportError> {
        let resp = self
            .http
            .get(self.url(&format!("/jobs/{id}")))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let resp = ensure_success(resp).await?;
        self.decode(resp).await.map(Some)
    }

    async fn create_job(&self, job: &NewJob) -> Result<Job, TransportError> {
        let resp = self
            .http
            .post(self.url("/jobs"))
            .json(job)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let resp = ensure_success(resp).await?;
        self.decode(resp).await
    }
}
