use thiserror::Error;

/// Failures of a single upstream fetch.
///
/// `Clone` so that one outcome can be handed to every caller waiting on the
/// same in-flight refresh.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Upstream request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },
    #[error("Upstream returned HTTP {status} for {url}")]
    UpstreamHttp { status: u16, url: String },
    #[error("Failed to parse upstream response: {0}")]
    Parse(String),
    #[error("Upstream transport error: {0}")]
    Transport(String),
    #[error("Upstream refresh task aborted: {0}")]
    Aborted(String),
}

impl FetchError {
    /// Short machine-friendly label, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout { .. } => "timeout",
            FetchError::UpstreamHttp { .. } => "upstream_http",
            FetchError::Parse(_) => "parse",
            FetchError::Transport(_) => "transport",
            FetchError::Aborted(_) => "aborted",
        }
    }
}

/// No usable data, fresh or stale, after a failed fetch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("Status unavailable: {0}")]
    Unavailable(#[from] FetchError),
}
