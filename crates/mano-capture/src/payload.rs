//! Classification payload construction.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;

use mano_models::{ClassificationPayload, ExtractionResult, PayloadMode};

use crate::error::{CaptureError, CaptureResult};

/// Default JPEG quality for image payloads.
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Result of building a payload for one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    Payload(ClassificationPayload),
    /// Nothing to classify; the frame must not be dispatched.
    Skip,
}

/// Builds the wire payload in a mode fixed at construction.
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    mode: PayloadMode,
    jpeg_quality: u8,
}

impl PayloadBuilder {
    pub fn new(mode: PayloadMode, jpeg_quality: u8) -> Self {
        Self {
            mode,
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    pub fn mode(&self) -> PayloadMode {
        self.mode
    }

    pub fn build(&self, result: &ExtractionResult) -> CaptureResult<BuildOutcome> {
        if result.is_empty() {
            return Ok(BuildOutcome::Skip);
        }

        let payload = match self.mode {
            PayloadMode::Landmarks => {
                ClassificationPayload::Landmarks(result.hands.iter().map(|h| h.flatten()).collect())
            }
            PayloadMode::Image => ClassificationPayload::Image(self.encode_frame(result)?),
        };

        Ok(BuildOutcome::Payload(payload))
    }

    fn encode_frame(&self, result: &ExtractionResult) -> CaptureResult<String> {
        let pixels = &result.frame.pixels;
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.jpeg_quality)
            .encode(pixels.as_raw(), pixels.width(), pixels.height(), ColorType::Rgb8)
            .map_err(|e| CaptureError::Encode(e.to_string()))?;

        let mut url = String::with_capacity(JPEG_DATA_URL_PREFIX.len() + jpeg.len() * 4 / 3 + 4);
        url.push_str(JPEG_DATA_URL_PREFIX);
        STANDARD.encode_string(&jpeg, &mut url);
        Ok(url)
    }
}

impl Default for PayloadBuilder {
    fn default() -> Self {
        Self::new(PayloadMode::default(), DEFAULT_JPEG_QUALITY)
    }
}
