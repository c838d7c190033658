//! Error types for the screener

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the screener
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    // Upstream data source errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Upstream {endpoint} returned status {status}")]
    UpstreamStatus { endpoint: String, status: u16 },

    #[error("Upstream timeout after {0}ms")]
    UpstreamTimeout(u64),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // State persistence errors
    #[error("State persistence failed: {0}")]
    StatePersistence(String),

    // Notification errors
    #[error("Notification delivery failed: {0}")]
    Notification(String),

    #[error("Invalid filter pattern: {0}")]
    InvalidPattern(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error came from an upstream data source.
    ///
    /// Upstream errors are degradable: callers substitute the documented
    /// zero/neutral default instead of propagating.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Error::Http(_) | Error::UpstreamStatus { .. } | Error::UpstreamTimeout(_)
        )
    }

    /// Check if this error only affects persistence.
    ///
    /// A cycle's in-memory result stays valid when persistence fails.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Error::StatePersistence(_))
    }
}

// Conversion from reqwest errors
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            // reqwest does not expose the configured timeout; report the
            // per-call budget the clients use
            Error::UpstreamTimeout(10_000)
        } else {
            Error::Http(e.to_string())
        }
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_classification() {
        assert!(Error::Http("connection reset".into()).is_upstream());
        assert!(Error::UpstreamStatus {
            endpoint: "dexscreener".into(),
            status: 429
        }
        .is_upstream());
        assert!(Error::UpstreamTimeout(10_000).is_upstream());
        assert!(!Error::Config("bad".into()).is_upstream());
        assert!(!Error::StatePersistence("disk full".into()).is_upstream());
    }

    #[test]
    fn test_persistence_classification() {
        assert!(Error::StatePersistence("disk full".into()).is_persistence());
        assert!(!Error::Http("nope".into()).is_persistence());
    }
}
