//! Error taxonomy for registry, build, search, and remote operations.
//!
//! Components return [`Error`] values; nothing inside the crate panics on a
//! failed operation. The tool layer turns these into result payloads and the
//! HTTP server maps variants onto status codes — conversion to a display
//! string happens only at those outer boundaries.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure an operation can report, by category.
#[derive(Debug, Error)]
pub enum Error {
    /// The named resource (or package, or file) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation would collide with an existing identifier.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The caller's arguments are unusable (empty query, bad line range, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A required external capability is missing or unconfigured
    /// (credential not set, `rg` not installed, storage not writable).
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// A network or HTTP call to an external service failed.
    #[error("remote failure: {0}")]
    RemoteFailure(String),

    /// Fetching, chunking, or indexing a resource failed.
    #[error("build failure: {0}")]
    BuildFailure(String),

    /// A bounded async wait ran out of budget. Retryable, not terminal.
    #[error("still processing: run {run_id} has not completed yet, poll again later")]
    StillProcessing { run_id: String },
}

impl Error {
    /// Whether the caller should retry the same call later.
    ///
    /// Only [`Error::StillProcessing`] qualifies; every other variant is
    /// reported once and not retried automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StillProcessing { .. })
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::RemoteFailure(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_category_and_detail() {
        let e = Error::NotFound("resource 'tokio'".to_string());
        assert_eq!(e.to_string(), "not found: resource 'tokio'");

        let e = Error::InvalidInput("query must not be empty".to_string());
        assert!(e.to_string().starts_with("invalid input:"));
    }

    #[test]
    fn test_still_processing_includes_run_id() {
        let e = Error::StillProcessing {
            run_id: "run_abc123".to_string(),
        };
        assert!(e.to_string().contains("run_abc123"));
        assert!(e.is_retryable());
    }

    #[test]
    fn test_other_variants_not_retryable() {
        assert!(!Error::Conflict("x".to_string()).is_retryable());
        assert!(!Error::RemoteFailure("x".to_string()).is_retryable());
    }
}
