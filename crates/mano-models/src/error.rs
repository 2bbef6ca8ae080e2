//! Model validation errors.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("Hand must have {expected} landmarks, got {actual}")]
    LandmarkCount { expected: usize, actual: usize },

    #[error("Landmark vector must have {expected} values, got {actual}")]
    VectorLength { expected: usize, actual: usize },

    #[error("Predicted sign has no labels")]
    EmptySign,

    #[error("Invalid payload mode: {0}")]
    InvalidMode(String),
}
