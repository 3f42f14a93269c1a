//! Error types for the SRV announcer
//!
//! The engine only needs to tell two things apart: failures worth retrying on
//! the next health observation, and failures that must stop the process.

use thiserror::Error;

/// Result type alias for announcer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the SRV announcer
#[derive(Error, Debug)]
pub enum Error {
    /// Transient backend failure (network, API rate limit, server error)
    #[error("Backend error ({manager}): {message}")]
    Backend {
        /// Record manager that produced the error
        manager: String,
        /// Error message
        message: String,
    },

    /// Configuration errors (missing values, unresolvable zone or record set)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A single failed probe inside a health source
    #[error("Probe error: {0}")]
    Probe(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a transient backend error
    pub fn backend(manager: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            manager: manager.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a probe error
    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe(msg.into())
    }

    /// Whether the engine should keep running and retry on the next observation
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }

    /// Whether this error indicates misconfiguration
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_errors_are_retryable() {
        let err = Error::backend("cloudflare", "503 Service Unavailable");
        assert!(err.is_retryable());
        assert!(!err.is_config());
        assert_eq!(
            err.to_string(),
            "Backend error (cloudflare): 503 Service Unavailable"
        );
    }

    #[test]
    fn test_config_errors_are_fatal() {
        let err = Error::config("zone example.com not found");
        assert!(!err.is_retryable());
        assert!(err.is_config());
    }

    #[test]
    fn test_other_errors_are_not_retryable() {
        let err: Error = anyhow::anyhow!("boom").into();
        assert!(!err.is_retryable());
        assert!(matches!(err, Error::Other(ref m) if m == "boom"));

        let io: Error = std::io::Error::other("disk").into();
        assert!(!io.is_retryable());
    }
}
