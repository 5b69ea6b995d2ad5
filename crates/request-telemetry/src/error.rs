//! Error types for telemetry operations.
//!
//! Most failures inside the pipeline are recovered locally (an unserializable
//! field is dropped, a sink write error is logged). The variants here are the
//! ones a caller has to see: misuse of a finished recorder and invalid
//! configuration.

use thiserror::Error;

/// Main error type for the telemetry crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TelemetryError {
    /// A recorder was used after it already emitted its terminal record.
    #[error("{recorder} recorder already emitted its final record; `{operation}` is not allowed")]
    RecorderConsumed {
        /// Which recorder was misused (`detail` or `summary`).
        recorder: &'static str,
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// Configuration-related errors.
    #[error("Configuration error: {message}")]
    Config {
        /// What was wrong with the configuration.
        message: String,
    },

    /// Serialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors while opening a sink.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TelemetryError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if this error reports reuse of a finished recorder.
    pub fn is_recorder_consumed(&self) -> bool {
        matches!(self, Self::RecorderConsumed { .. })
    }
}

/// Result type alias for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_consumed_display() {
        let err = TelemetryError::RecorderConsumed {
            recorder: "detail",
            operation: "add_detail",
        };
        let text = err.to_string();
        assert!(text.contains("detail recorder"));
        assert!(text.contains("`add_detail`"));
        assert!(err.is_recorder_consumed());
    }

    #[test]
    fn test_config_error_display() {
        let err = TelemetryError::config("service name must not be empty");
        assert_eq!(
            err.to_string(),
            "Configuration error: service name must not be empty"
        );
        assert!(!err.is_recorder_consumed());
    }

    #[test]
    fn test_serialization_error_from() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: TelemetryError = json_err.into();
        assert!(matches!(err, TelemetryError::Serialization(_)));
    }

    #[test]
    fn test_io_error_from() {
        let err: TelemetryError = std::io::Error::other("denied").into();
        assert_eq!(err.to_string(), "I/O error: denied");
    }
}
