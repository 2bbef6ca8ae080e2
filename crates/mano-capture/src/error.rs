//! Error types for capture operations.

use std::path::PathBuf;
use thiserror::Error;

use mano_models::SessionState;

/// Result type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Errors that can occur while capturing, extracting or encoding frames.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Landmark extraction failed: {0}")]
    ExtractionFailure(String),

    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Frame encoding failed: {0}")]
    Encode(String),

    #[error("Invalid recording {path}: {message}")]
    Replay { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl CaptureError {
    /// Create a device unavailable error.
    pub fn device_unavailable(message: impl Into<String>) -> Self {
        Self::DeviceUnavailable(message.into())
    }

    /// Create an extraction failure error.
    pub fn extraction_failed(message: impl Into<String>) -> Self {
        Self::ExtractionFailure(message.into())
    }

    /// Create an invalid state error.
    pub fn invalid_state(operation: &'static str, state: SessionState) -> Self {
        Self::InvalidState { operation, state }
    }

    /// Create a replay error for a recording file.
    pub fn replay(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Replay {
            path: path.into(),
            message: message.into(),
        }
    }
}
