//! Shared data models for the ManoLingua capture pipeline.
//!
//! This crate provides the types that flow between the pipeline stages:
//! - Captured video frames and per-frame extraction results
//! - Hand landmarks and their flattened wire vectors
//! - Classification payloads and predicted signs
//! - Session and prediction state exposed to observers
//! - Epoch tokens used to discard stale asynchronous results

pub mod epoch;
pub mod error;
pub mod frame;
pub mod landmark;
pub mod payload;
pub mod prediction;
pub mod session;

// Re-export common types
pub use epoch::{Epoch, Stamped};
pub use error::{ModelError, ModelResult};
pub use frame::{ExtractionResult, VideoFrame};
pub use landmark::{HandRecord, Landmark, LandmarkVector, LANDMARKS_PER_HAND, VALUES_PER_HAND};
pub use payload::{ClassificationPayload, PayloadMode};
pub use prediction::{PredictedSign, PredictionState, SIGN_SEPARATOR};
pub use session::{DeviceSelector, SessionState};
