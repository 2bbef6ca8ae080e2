//! ManoLingua pipeline controller.
//!
//! This crate provides:
//! - The per-frame controller tying capture, extraction and classification
//! - Single-flight, cooldown-gated request throttling
//! - Stale-result protection across session stop and device switch
//! - Environment configuration, session logging and metrics

pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod throttle;

pub use config::PipelineConfig;
pub use controller::{
    Completion, CompletionOutcome, ControllerPhase, PipelineController, PipelineHandle, TickOutcome,
};
pub use error::{PipelineError, PipelineResult};
pub use logging::SessionLogger;
pub use throttle::{Admission, Permit, RejectReason, RequestThrottler, DEFAULT_COOLDOWN};
