//! HTTP-backed step targets.

use super::{StepRequest, StepTarget};
use crate::core::{FailureKind, StepError};
use crate::errors::{ContractErrorInfo, PipelineValidationError};
use async_trait::async_trait;
use reqwest::{redirect, Client, Url};
use tracing::debug;

/// User agent sent by HTTP targets.
pub const DEFAULT_USER_AGENT: &str = concat!("dailyflow/", env!("CARGO_PKG_VERSION"));

fn parse_url(url: &str) -> Result<Url, PipelineValidationError> {
    Url::parse(url).map_err(|e| {
        PipelineValidationError::new(format!("Invalid target URL '{url}': {e}")).with_error_info(
            ContractErrorInfo::new("CONFIG-TARGET", "Step target URL could not be parsed")
                .with_context_entry("url", url),
        )
    })
}

fn build_client(policy: redirect::Policy) -> Result<Client, PipelineValidationError> {
    Client::builder()
        .user_agent(DEFAULT_USER_AGENT)
        .redirect(policy)
        .build()
        .map_err(|e| PipelineValidationError::new(format!("Failed to build HTTP client: {e}")))
}

fn classify(err: &reqwest::Error) -> FailureKind {
    if err.is_timeout() {
        FailureKind::Timeout
    } else {
        FailureKind::TaskFailed
    }
}

/// POSTs the step request as JSON and returns the JSON response body.
#[derive(Debug, Clone)]
pub struct HttpTarget {
    url: Url,
    client: Client,
}

impl HttpTarget {
    /// Creates a target for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the URL is invalid.
    pub fn new(url: &str) -> Result<Self, PipelineValidationError> {
        Ok(Self {
            url: parse_url(url)?,
            client: build_client(redirect::Policy::default())?,
        })
    }

    /// Returns the endpoint.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl StepTarget for HttpTarget {
    async fn invoke(&self, request: StepRequest) -> Result<serde_json::Value, StepError> {
        debug!(url = %self.url, step = %request.step, "POST step request");

        let resp = self
            .client
            .post(self.url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| StepError::new(classify(&e), e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StepError::task_failed(format!("HTTP error: {status}: {body}")));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| StepError::new(classify(&e), e.to_string()))?;
        if bytes.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| StepError::task_failed(format!("invalid JSON response: {e}")))
    }
}

/// Sends a one-way GET to a fixed endpoint to signal that the pipeline got here.
///
/// Redirects are not followed; a 3xx answer fails the step. The result is
/// `{"endpoint": ..., "status": ...}`.
#[derive(Debug, Clone)]
pub struct HeartbeatTarget {
    url: Url,
    client: Client,
}

impl HeartbeatTarget {
    /// Creates a heartbeat target for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the URL is invalid.
    pub fn new(url: &str) -> Result<Self, PipelineValidationError> {
        Ok(Self {
            url: parse_url(url)?,
            client: build_client(redirect::Policy::none())?,
        })
    }

    /// Returns the endpoint.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl StepTarget for HeartbeatTarget {
    async fn invoke(&self, request: StepRequest) -> Result<serde_json::Value, StepError> {
        debug!(url = %self.url, step = %request.step, "Sending heartbeat");

        let resp = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| StepError::new(classify(&e), e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(StepError::task_failed(format!("HTTP status not 2xx: {status}")));
        }

        Ok(serde_json::json!({
            "endpoint": self.url.as_str(),
            "status": status.as_u16(),
        }))
    }
}
