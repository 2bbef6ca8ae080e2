//! Capture device fed from another task through a bounded channel.
//!
//! A platform camera callback (or a test) pushes frames through a
//! [`FrameFeed`]. The buffer is bounded: when the pipeline falls behind,
//! new frames are dropped instead of queueing.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use tokio::sync::mpsc;
use tracing::{debug, info};

use mano_models::{DeviceSelector, VideoFrame};

use crate::device::{CaptureDevice, DeviceInfo};
use crate::error::{CaptureError, CaptureResult};

/// Frames buffered between the feed and the pipeline.
pub const DEFAULT_FRAME_BUFFER: usize = 2;

const FRAMES_DROPPED_TOTAL: &str = "mano_capture_frames_dropped_total";

#[derive(Debug, Default)]
struct FeedShared {
    open: AtomicBool,
    dropped: AtomicU64,
}

/// Producer side of a [`ChannelCapture`].
#[derive(Debug, Clone)]
pub struct FrameFeed {
    sender: mpsc::Sender<VideoFrame>,
    shared: Arc<FeedShared>,
}

impl FrameFeed {
    /// Offer a frame. Returns `false` if it was dropped because the device
    /// is closed or the buffer is full.
    pub fn push(&self, frame: VideoFrame) -> bool {
        if !self.shared.open.load(Ordering::Acquire) {
            return false;
        }
        match self.sender.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(frame)) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                counter!(FRAMES_DROPPED_TOTAL).increment(1);
                debug!(sequence = frame.sequence, "Frame buffer full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Whether the device behind this feed is currently open.
    pub fn is_device_open(&self) -> bool {
        self.shared.open.load(Ordering::Acquire)
    }

    /// Frames dropped because the buffer was full.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

/// Capture device whose frames come from a [`FrameFeed`].
pub struct ChannelCapture {
    receiver: mpsc::Receiver<VideoFrame>,
    shared: Arc<FeedShared>,
    available: Option<Vec<DeviceSelector>>,
    width: u32,
    height: u32,
    frame_rate: f32,
}

impl ChannelCapture {
    /// Create a device and its feed with room for `buffer` pending frames.
    pub fn new(buffer: usize, width: u32, height: u32, frame_rate: f32) -> (Self, FrameFeed) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let shared = Arc::new(FeedShared::default());
        let device = Self {
            receiver,
            shared: Arc::clone(&shared),
            available: None,
            width,
            height,
            frame_rate,
        };
        (device, FrameFeed { sender, shared })
    }

    /// Restrict which selectors can be opened; others fail as unavailable.
    pub fn with_available(mut self, selectors: Vec<DeviceSelector>) -> Self {
        self.available = Some(selectors);
        self
    }

    fn drain(&mut self) {
        while self.receiver.try_recv().is_ok() {}
    }
}

#[async_trait]
impl CaptureDevice for ChannelCapture {
    async fn open(&mut self, selector: &DeviceSelector) -> CaptureResult<DeviceInfo> {
        if let Some(available) = &self.available {
            if !available.contains(selector) {
                return Err(CaptureError::device_unavailable(format!(
                    "no camera matches '{}'",
                    selector
                )));
            }
        }

        self.drain();
        self.shared.open.store(true, Ordering::Release);
        info!(device = %selector, "Channel capture opened");

        Ok(DeviceInfo {
            selector: selector.clone(),
            label: format!("channel:{}", selector),
            width: self.width,
            height: self.height,
            frame_rate: self.frame_rate,
        })
    }

    async fn next_frame(&mut self) -> CaptureResult<Option<VideoFrame>> {
        Ok(self.receiver.recv().await)
    }

    fn close(&mut self) {
        if self.shared.open.swap(false, Ordering::AcqRel) {
            debug!("Channel capture closed");
        }
        self.drain();
    }
}
