//! Error types for the UltraVision batch pipeline.
//!
//! Errors are organized by where they surface: configuration problems abort a
//! run before any work starts, per-file pipeline errors skip a single file, and
//! remote call errors are retried and then recorded against their batch.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for UltraVision operations.
#[derive(Error, Debug)]
pub enum UltravisionError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl UltravisionError {
    /// Whether this error should end the process with the configuration exit status.
    pub fn is_config(&self) -> bool {
        matches!(self, UltravisionError::Config(_))
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// The `extra` request fields are not a JSON object
    #[error("Invalid extra JSON: {0}")]
    InvalidExtra(String),

    /// The input path is missing or not a directory
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),
}

/// Per-file and per-batch pipeline errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// An input file could not be read
    #[error("Cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The remote chat-completions call failed
    #[error(transparent)]
    Remote(#[from] RemoteCallError),
}

/// Failures of the remote chat-completions call.
#[derive(Error, Debug)]
pub enum RemoteCallError {
    /// Connection, DNS or protocol failure before a response arrived
    #[error("request failed: {0}")]
    Transport(String),

    /// The server answered with status >= 400
    #[error("{status} {reason}: {body}")]
    Status {
        status: u16,
        reason: String,
        body: String,
    },

    /// The response body was not valid JSON
    #[error("invalid response body: {0}")]
    Decode(String),

    /// The request exceeded its timeout
    #[error("request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

/// Convenience type alias for UltraVision results.
pub type Result<T> = std::result::Result<T, UltravisionError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display() {
        let err = RemoteCallError::Status {
            status: 503,
            reason: "Service Unavailable".to_string(),
            body: "model loading".to_string(),
        };
        assert_eq!(err.to_string(), "503 Service Unavailable: model loading");
    }

    #[test]
    fn test_not_a_directory_display() {
        let err = ConfigError::NotADirectory(PathBuf::from("/tmp/missing"));
        assert_eq!(err.to_string(), "/tmp/missing is not a directory");
    }

    #[test]
    fn test_config_errors_are_flagged() {
        let err: UltravisionError = ConfigError::InvalidExtra("expected object".into()).into();
        assert!(err.is_config());

        let err: UltravisionError = std::io::Error::other("disk full").into();
        assert!(!err.is_config());
    }
}
