use async_trait::async_trait;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use std::time::Duration;
use tracing::debug;

use super::error::FetchError;
use super::payload::RawMonitorPayload;

/// The provider rejects requests that do not look like they come from a browser.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Outbound GET of the provider payload with a hard time budget.
#[async_trait]
pub trait StatusFetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<RawMonitorPayload, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    async fn get_json(&self, url: &str, timeout: Duration) -> Result<RawMonitorPayload, FetchError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| from_reqwest(e, url, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::UpstreamHttp {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| from_reqwest(e, url, timeout))?;
        debug!(url = %url, bytes = body.len(), "Received upstream response body.");

        serde_json::from_slice(&body).map_err(|e| FetchError::Parse(e.to_string()))
    }
}

#[async_trait]
impl StatusFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<RawMonitorPayload, FetchError> {
        // Dropping the request future on expiry aborts the connection; the
        // timer itself is dropped on every exit path.
        match tokio::time::timeout(timeout, self.get_json(url, timeout)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(timeout_error(url, timeout)),
        }
    }
}

fn timeout_error(url: &str, timeout: Duration) -> FetchError {
    FetchError::Timeout {
        url: url.to_string(),
        timeout_ms: timeout.as_millis() as u64,
    }
}

fn from_reqwest(err: reqwest::Error, url: &str, timeout: Duration) -> FetchError {
    if err.is_timeout() {
        timeout_error(url, timeout)
    } else if err.is_decode() {
        FetchError::Parse(err.to_string())
    } else {
        FetchError::Transport(format!("{url}: {err}"))
    }
}
