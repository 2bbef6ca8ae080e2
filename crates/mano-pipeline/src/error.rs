//! Pipeline error types.

use thiserror::Error;

use mano_capture::CaptureError;
use mano_ml_client::MlError;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Pipeline is not running: {0}")]
    ChannelClosed(String),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Classification error: {0}")]
    Ml(#[from] MlError),
}

impl PipelineError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn channel_closed(msg: impl Into<String>) -> Self {
        Self::ChannelClosed(msg.into())
    }

    /// Errors the caller may retry after fixing the input (another device,
    /// a running controller).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::Capture(CaptureError::DeviceUnavailable(_))
                | PipelineError::Capture(CaptureError::InvalidState { .. })
        )
    }
}
