// HTTP client for the downstream RAG backend.
use anyhow::{anyhow, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Downstream operation a tool call is forwarded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendOperation {
    /// Semantic query over the applique component index.
    Query,
    /// Image description via the backend's vision pipeline.
    DescribeImage,
}

impl BackendOperation {
    pub fn path(&self) -> &'static str {
        match self {
            BackendOperation::Query => "/query",
            BackendOperation::DescribeImage => "/describe-image",
        }
    }
}

/// Issues JSON POST requests to the backend and parses the responses.
///
/// The client does not retry and does not classify failures; network errors,
/// non-2xx statuses, malformed bodies and timeouts all surface to the caller
/// as-is, and the caller is responsible for folding them into a result
/// envelope.
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Serialize `payload` as JSON, POST it to the operation's endpoint and
    /// parse the response body as JSON.
    ///
    /// When `timeout` is set the whole call is bound to it: once the duration
    /// elapses the in-flight request is aborted and the call fails with a
    /// timeout error instead of hanging. Without it the call is bounded only
    /// by the transport's defaults.
    pub async fn call(
        &self,
        operation: BackendOperation,
        payload: &Value,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), operation.path());

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(payload);
        if let Some(duration) = timeout {
            request = request.timeout(duration);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Backend request to {} failed with status: {}",
                operation.path(),
                response.status()
            ));
        }

        let result: Value = response.json().await?;
        Ok(result)
    }
}
