//! Pipeline configuration.

use std::time::Duration;

use mano_capture::{EngineOptions, DEFAULT_JPEG_QUALITY};
use mano_models::{DeviceSelector, PayloadMode};

use crate::error::{PipelineError, PipelineResult};
use crate::throttle::DEFAULT_COOLDOWN;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// What is sent to the classifier
    pub mode: PayloadMode,
    /// Maximum hands per frame (1 or 2)
    pub max_hands: usize,
    /// Extraction model complexity (0 = lite, 1 = full)
    pub model_complexity: u8,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
    /// Minimum time between two dispatches
    pub cooldown: Duration,
    /// Requested capture width
    pub frame_width: u32,
    /// Requested capture height
    pub frame_height: u32,
    /// Camera to open on start
    pub device: DeviceSelector,
    /// JPEG quality for image payloads
    pub jpeg_quality: u8,
    /// Extractions slower than this are logged
    pub extraction_budget: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: PayloadMode::Landmarks,
            max_hands: 1,
            model_complexity: 1,
            min_detection_confidence: 0.7,
            min_tracking_confidence: 0.7,
            cooldown: DEFAULT_COOLDOWN,
            frame_width: 640,
            frame_height: 480,
            device: DeviceSelector::Front,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            extraction_budget: Duration::from_millis(100),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

impl PipelineConfig {
    /// Create config from environment variables. Unset or unparsable values
    /// fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            mode: env_parse("MANO_PAYLOAD_MODE").unwrap_or(defaults.mode),
            max_hands: env_parse("MANO_MAX_HANDS").unwrap_or(defaults.max_hands),
            model_complexity: env_parse("MANO_MODEL_COMPLEXITY")
                .unwrap_or(defaults.model_complexity),
            min_detection_confidence: env_parse("MANO_MIN_DETECTION_CONFIDENCE")
                .unwrap_or(defaults.min_detection_confidence),
            min_tracking_confidence: env_parse("MANO_MIN_TRACKING_CONFIDENCE")
                .unwrap_or(defaults.min_tracking_confidence),
            cooldown: env_parse("MANO_COOLDOWN_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.cooldown),
            frame_width: env_parse("MANO_FRAME_WIDTH").unwrap_or(defaults.frame_width),
            frame_height: env_parse("MANO_FRAME_HEIGHT").unwrap_or(defaults.frame_height),
            device: env_parse("MANO_DEVICE").unwrap_or(defaults.device),
            jpeg_quality: env_parse("MANO_JPEG_QUALITY").unwrap_or(defaults.jpeg_quality),
            extraction_budget: env_parse("MANO_EXTRACTION_BUDGET_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.extraction_budget),
        }
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if !(1..=2).contains(&self.max_hands) {
            return Err(PipelineError::config_error(format!(
                "max_hands must be 1 or 2, got {}",
                self.max_hands
            )));
        }
        for (name, value) in [
            ("min_detection_confidence", self.min_detection_confidence),
            ("min_tracking_confidence", self.min_tracking_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PipelineError::config_error(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(PipelineError::config_error(format!(
                "jpeg_quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(PipelineError::config_error("frame dimensions must be non-zero"));
        }
        Ok(())
    }

    /// Options handed to the extraction engine on session start.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            max_hands: self.max_hands,
            model_complexity: self.model_complexity,
            min_detection_confidence: self.min_detection_confidence,
            min_tracking_confidence: self.min_tracking_confidence,
        }
    }
}
