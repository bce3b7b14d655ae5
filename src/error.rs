//! Error types for deviation network experiments.

use thiserror::Error;

/// Result type for deviation network operations.
pub type DevNetResult<T> = Result<T, DevNetError>;

/// Errors that can occur while preparing data, training or evaluating.
#[derive(Debug, Error)]
pub enum DevNetError {
    /// Invalid configuration (network depth, batch size, contamination rate...)
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Not enough rows to carry out an operation
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Matrix dimensions do not line up
    #[error("Shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    /// Malformed dataset record
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reader/writer error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Checkpoint/config serialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl DevNetError {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an insufficient data error
    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        Self::InsufficientData(msg.into())
    }

    /// Create a shape mismatch error
    pub fn shape_mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }

    /// Create a parse error for a 1-based line number
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}
