//! Captured frames and per-frame extraction results.

use std::sync::Arc;
use std::time::Duration;

use image::RgbImage;

use crate::landmark::HandRecord;

/// One captured image.
///
/// Pixels are shared behind an `Arc` so handing the frame to the extractor
/// and the payload builder in the same tick does not copy the buffer.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Monotonic frame counter assigned by the capture device
    pub sequence: u64,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Capture time relative to the start of the device stream
    pub captured_at: Duration,
    /// RGB pixel data
    pub pixels: Arc<RgbImage>,
}

impl VideoFrame {
    /// Create a frame from an RGB image; dimensions are taken from the image.
    pub fn new(sequence: u64, captured_at: Duration, pixels: RgbImage) -> Self {
        Self {
            sequence,
            width: pixels.width(),
            height: pixels.height(),
            captured_at,
            pixels: Arc::new(pixels),
        }
    }

    /// Create a black frame of the given size.
    pub fn blank(sequence: u64, captured_at: Duration, width: u32, height: u32) -> Self {
        Self::new(sequence, captured_at, RgbImage::new(width, height))
    }
}

/// Hands detected in one frame, in extractor order.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub hands: Vec<HandRecord>,
    pub frame: VideoFrame,
}

impl ExtractionResult {
    pub fn new(frame: VideoFrame, hands: Vec<HandRecord>) -> Self {
        Self { hands, frame }
    }

    /// Result with no detected hands.
    pub fn empty(frame: VideoFrame) -> Self {
        Self {
            hands: Vec::new(),
            frame,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hands.is_empty()
    }

    pub fn hand_count(&self) -> usize {
        self.hands.len()
    }
}
