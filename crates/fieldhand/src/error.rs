// ABOUTME: Error types for fieldhand: FetchError for navigation plus per-concern enums.
// ABOUTME: Store, checkpoint, crawl and config failures each get their own thiserror enum.

use std::fmt;
use std::path::PathBuf;

/// Error codes representing different categories of navigation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidUrl,
    Fetch,
    Timeout,
    Ssrf,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::InvalidUrl => "invalid URL",
            ErrorCode::Fetch => "fetch error",
            ErrorCode::Timeout => "timeout",
            ErrorCode::Ssrf => "SSRF blocked",
        };
        write!(f, "{}", s)
    }
}

/// A failed page load.
#[derive(Debug, thiserror::Error)]
pub struct FetchError {
    pub code: ErrorCode,
    pub url: String,
    pub op: String,
    #[source]
    pub source: Option<anyhow::Error>,
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fieldhand: {} {}: {}", self.op, self.url, self.code)?;
        if let Some(ref src) = self.source {
            write!(f, ": {}", src)?;
        }
        Ok(())
    }
}

impl FetchError {
    fn new(
        code: ErrorCode,
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code,
            url: url.into(),
            op: op.into(),
            source,
        }
    }

    /// Create an InvalidUrl error.
    pub fn invalid_url(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::InvalidUrl, url, op, source)
    }

    /// Create a Fetch error.
    pub fn fetch(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::Fetch, url, op, source)
    }

    /// Create a Timeout error.
    pub fn timeout(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::Timeout, url, op, source)
    }

    /// Create an SSRF error.
    pub fn ssrf(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::Ssrf, url, op, source)
    }

    pub fn is_timeout(&self) -> bool {
        self.code == ErrorCode::Timeout
    }

    pub fn is_ssrf(&self) -> bool {
        self.code == ErrorCode::Ssrf
    }

    pub fn is_fetch(&self) -> bool {
        self.code == ErrorCode::Fetch
    }

    pub fn is_invalid_url(&self) -> bool {
        self.code == ErrorCode::InvalidUrl
    }
}

/// Failures talking to the record store. Always recovered per record.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store was set up with an unusable location.
    #[error("invalid store configuration: {0}")]
    Config(String),

    /// The backend could not be reached or the response could not be read.
    #[error("store request failed: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("store rejected record ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// Local storage failed.
    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Transport(err.to_string())
    }
}

/// Failures of the medium that carries crawl state across navigations.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("failed to access checkpoint {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode checkpoint: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("corrupt checkpoint {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors surfaced by the bulk crawl controller.
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    /// The list selector matched no usable http(s) links.
    #[error("no links found for list selector {selector:?}")]
    NoLinksFound { selector: String },

    /// A resume was requested but there is no running crawl to continue.
    #[error("no running crawl to resume")]
    NothingToResume,

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

impl CrawlError {
    /// Returns true when the failure happened during link discovery.
    pub fn is_discovery(&self) -> bool {
        matches!(self, CrawlError::NoLinksFound { .. })
    }
}

/// Errors loading site configuration files.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display_includes_source() {
        let err = FetchError::ssrf(
            "http://127.0.0.1/",
            "Fetch",
            Some(anyhow::anyhow!("private IP addresses are not allowed")),
        );
        assert!(err.is_ssrf());
        assert_eq!(
            err.to_string(),
            "fieldhand: Fetch http://127.0.0.1/: SSRF blocked: private IP addresses are not allowed"
        );
    }

    #[test]
    fn test_discovery_errors_are_flagged() {
        let err = CrawlError::NoLinksFound {
            selector: ".row".to_string(),
        };
        assert!(err.is_discovery());
        assert!(!CrawlError::NothingToResume.is_discovery());
    }

    #[test]
    fn test_rejected_store_error_mentions_status() {
        let err = StoreError::Rejected {
            status: 409,
            body: "conflict".to_string(),
        };
        assert_eq!(err.to_string(), "store rejected record (409): conflict");
    }
}
