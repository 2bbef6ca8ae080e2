//! Hand landmark extraction.
//!
//! [`FrameExtractor`] wraps an external [`ExtractionEngine`] and turns its raw
//! per-frame output into validated [`HandRecord`]s. The engine is not
//! reentrant; the extractor holds it exclusively and calls it through
//! `&mut self`, so two extractions can never overlap on one engine.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use mano_models::{ExtractionResult, HandRecord, Landmark, VideoFrame};

use crate::error::{CaptureError, CaptureResult};

/// Options passed to the engine when a session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Maximum hands to detect (1 or 2)
    pub max_hands: usize,
    /// Model complexity level (0 = lite, 1 = full)
    pub model_complexity: u8,
    /// Minimum palm detection confidence
    pub min_detection_confidence: f32,
    /// Minimum landmark tracking confidence
    pub min_tracking_confidence: f32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_hands: 1,
            model_complexity: 1,
            min_detection_confidence: 0.7,
            min_tracking_confidence: 0.7,
        }
    }
}

/// External landmark detector.
///
/// `process` returns one landmark list per detected hand, in the engine's
/// detection order. `close` must tolerate being called on a closed engine.
pub trait ExtractionEngine: Send {
    fn configure(&mut self, options: &EngineOptions) -> CaptureResult<()>;

    fn process(&mut self, frame: &VideoFrame) -> CaptureResult<Vec<Vec<Landmark>>>;

    fn close(&mut self);
}

/// Adapter that validates engine output into an [`ExtractionResult`].
pub struct FrameExtractor {
    engine: Box<dyn ExtractionEngine>,
    options: EngineOptions,
    budget: Duration,
}

impl FrameExtractor {
    /// Create an extractor. Extractions slower than `budget` are logged.
    pub fn new(engine: Box<dyn ExtractionEngine>, options: EngineOptions, budget: Duration) -> Self {
        Self {
            engine,
            options,
            budget,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Configure the engine for a new session.
    pub fn configure(&mut self) -> CaptureResult<()> {
        self.engine.configure(&self.options)
    }

    /// Release the engine.
    pub fn close(&mut self) {
        self.engine.close();
    }

    /// Run the engine on one frame.
    ///
    /// No hands is an empty result, not an error. Hands beyond `max_hands`
    /// are dropped from the end; the remaining order is the engine's.
    pub fn extract(&mut self, frame: &VideoFrame) -> CaptureResult<ExtractionResult> {
        let started = Instant::now();

        let raw = self.engine.process(frame).map_err(|e| match e {
            CaptureError::ExtractionFailure(_) => e,
            other => CaptureError::extraction_failed(other.to_string()),
        })?;

        let elapsed = started.elapsed();
        if elapsed > self.budget {
            warn!(
                sequence = frame.sequence,
                elapsed_ms = elapsed.as_millis() as u64,
                budget_ms = self.budget.as_millis() as u64,
                "Slow landmark extraction"
            );
        }

        let detected = raw.len();
        let hands = raw
            .into_iter()
            .take(self.options.max_hands)
            .map(HandRecord::new)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CaptureError::extraction_failed(e.to_string()))?;

        debug!(
            sequence = frame.sequence,
            detected,
            hands = hands.len(),
            "Extracted hands"
        );

        Ok(ExtractionResult::new(frame.clone(), hands))
    }
}
