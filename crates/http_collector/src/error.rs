//! Error types for the collector.

use thiserror::Error;

/// Errors produced by a single flush attempt.
///
/// A flush either fails to build its payload (`Serialization`) or fails to
/// deliver it. Both paths leave the unsent spans buffered for the next flush.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExportError {
    /// The encoder could not produce a payload
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Network or HTTP client failure
    #[error("transport error: {0}")]
    Transport(String),
    /// The endpoint answered with a non-success status
    #[error("collector endpoint returned status {status}")]
    Status { status: u16 },
    /// The request exceeded the configured timeout
    #[error("export request timed out")]
    Timeout,
}

impl ExportError {
    /// Returns `true` if the payload was never built.
    #[inline]
    pub fn is_encode_failure(&self) -> bool {
        matches!(self, Self::Serialization(_))
    }
}

/// Errors observable through the public `Collector` surface.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// The dispatch loop has stopped and no longer accepts spans.
    #[error("collector is closed")]
    Closed,
    /// The final drain on shutdown failed to deliver the remaining spans.
    #[error("final flush failed: {0}")]
    Shutdown(#[source] ExportError),
    /// The dispatch task panicked or was cancelled.
    #[error("dispatch task failed: {0}")]
    TaskFailed(String),
}

impl CollectorError {
    /// Returns the export failure behind a shutdown error, if any.
    pub fn export_error(&self) -> Option<&ExportError> {
        match self {
            Self::Shutdown(e) => Some(e),
            _ => None,
        }
    }
}

/// Errors raised while building or validating configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("invalid value {value:?} for {key}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("invalid collector url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to build http client: {0}")]
    HttpClient(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_error_exposes_source() {
        let err = CollectorError::Shutdown(ExportError::Status { status: 503 });
        assert_eq!(err.export_error(), Some(&ExportError::Status { status: 503 }));
        assert_eq!(
            err.to_string(),
            "final flush failed: collector endpoint returned status 503"
        );
        assert!(CollectorError::Closed.export_error().is_none());
    }

    #[test]
    fn test_encode_failure_classification() {
        assert!(ExportError::Serialization("bad".into()).is_encode_failure());
        assert!(!ExportError::Timeout.is_encode_failure());
    }
}
