//! ML client error types.

use thiserror::Error;

pub type MlResult<T> = Result<T, MlError>;

#[derive(Debug, Error)]
pub enum MlError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Timeout after {0} ms")]
    Timeout(u64),

    #[error("Classification service returned {status}: {body}")]
    ServiceStatus { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The two failure classes a classification call can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The request did not reach a working endpoint.
    Network,
    /// The endpoint answered with something that is not a prediction.
    InvalidResponse,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Network => "network",
            FailureKind::InvalidResponse => "invalid_response",
        }
    }
}

impl MlError {
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            MlError::Network(_) | MlError::Timeout(_) | MlError::ServiceStatus { .. } => {
                FailureKind::Network
            }
            MlError::InvalidResponse(_) | MlError::Json(_) => FailureKind::InvalidResponse,
        }
    }

    pub fn is_network(&self) -> bool {
        self.kind() == FailureKind::Network
    }
}
