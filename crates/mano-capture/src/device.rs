//! Capture device abstraction.

use async_trait::async_trait;
use serde::Serialize;

use mano_models::{DeviceSelector, VideoFrame};

use crate::error::CaptureResult;

/// What an opened device actually delivers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    /// Selector the device was opened with
    pub selector: DeviceSelector,
    /// Human-readable device label
    pub label: String,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Native frame rate
    pub frame_rate: f32,
}

/// A source of video frames.
///
/// Implementations own the hardware (or stand-in) handle. `open` and `close`
/// bracket one capture run; `close` must be safe to call on a device that
/// is already closed.
#[async_trait]
pub trait CaptureDevice: Send {
    /// Acquire the device matching `selector` and start streaming.
    async fn open(&mut self, selector: &DeviceSelector) -> CaptureResult<DeviceInfo>;

    /// Wait for the next frame. `Ok(None)` means the stream has ended.
    ///
    /// Must be cancel-safe: dropping the future before it resolves must not
    /// lose or duplicate a frame.
    async fn next_frame(&mut self) -> CaptureResult<Option<VideoFrame>>;

    /// Release the device.
    fn close(&mut self);
}
