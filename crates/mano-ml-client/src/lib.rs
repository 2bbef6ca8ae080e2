//! Client for the remote sign classification service.
//!
//! The service exposes a single `POST /predict` endpoint that accepts either
//! flattened hand landmark vectors or a base64-encoded frame and answers with
//! one or more predicted sign labels.

pub mod client;
pub mod error;
pub mod types;


pub use client::{Classifier, InferenceClient, InferenceClientConfig};
pub use error::{FailureKind, MlError, MlResult};
pub use types::{HealthResponse, PredictResponse};
