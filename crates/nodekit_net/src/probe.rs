//! Loopback probe
//!
//! One GET per user action. Callers read the body and throw it away; a
//! failure surfaces only as a string.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("cannot build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

pub struct LoopbackProbe {
    client: reqwest::Client,
    url: String,
}

impl LoopbackProbe {
    /// No timeout unless one is given.
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, ProbeError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(ProbeError::Client)?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn fetch(&self) -> Result<String, ProbeError> {
        let request = |source| ProbeError::Request {
            url: self.url.clone(),
            source,
        };
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(request)?;
        response.text().await.map_err(request)
    }

    /// Body on success, the error message otherwise.
    pub async fn probe(&self) -> String {
        match self.fetch().await {
            Ok(body) => {
                tracing::debug!(url = %self.url, bytes = body.len(), "Probe answered");
                body
            }
            Err(err) => {
                tracing::debug!(%err, "Probe failed");
                err.to_string()
            }
        }
    }
}
