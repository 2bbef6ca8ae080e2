//! Camera session lifecycle.
//!
//! A [`CameraSession`] exclusively owns one capture device and one
//! extraction engine (through its [`FrameExtractor`]). Both are acquired on
//! `start` and released on `stop`; every failed start releases whatever was
//! acquired before returning.

use tokio::sync::watch;
use tracing::{info, warn};

use mano_models::{DeviceSelector, ExtractionResult, SessionState, VideoFrame};

use crate::device::{CaptureDevice, DeviceInfo};
use crate::error::{CaptureError, CaptureResult};
use crate::extractor::FrameExtractor;

pub struct CameraSession {
    device: Box<dyn CaptureDevice>,
    extractor: FrameExtractor,
    state: watch::Sender<SessionState>,
    info: Option<DeviceInfo>,
}

impl CameraSession {
    pub fn new(device: Box<dyn CaptureDevice>, extractor: FrameExtractor) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            device,
            extractor,
            state,
            info: None,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// The open device, while the session is active.
    pub fn device(&self) -> Option<&DeviceInfo> {
        self.info.as_ref()
    }

    fn set_state(&self, state: SessionState) {
        self.state.send_replace(state);
    }

    fn release(&mut self) {
        self.device.close();
        self.extractor.close();
        self.info = None;
    }

    /// Acquire the device and engine. Only legal from `Idle`.
    pub async fn start(&mut self, selector: &DeviceSelector) -> CaptureResult<DeviceInfo> {
        let current = self.state();
        if current != SessionState::Idle {
            return Err(CaptureError::invalid_state("start", current));
        }

        self.set_state(SessionState::Starting);

        let info = match self.device.open(selector).await {
            Ok(info) => info,
            Err(e) => {
                warn!(device = %selector, "Failed to open capture device: {}", e);
                self.release();
                self.set_state(SessionState::Idle);
                return Err(match e {
                    CaptureError::DeviceUnavailable(_) => e,
                    other => CaptureError::device_unavailable(other.to_string()),
                });
            }
        };

        if let Err(e) = self.extractor.configure() {
            warn!(device = %selector, "Failed to configure extraction engine: {}", e);
            self.release();
            self.set_state(SessionState::Idle);
            return Err(match e {
                CaptureError::DeviceUnavailable(_) => e,
                other => CaptureError::device_unavailable(other.to_string()),
            });
        }

        info!(
            device = %info.label,
            width = info.width,
            height = info.height,
            frame_rate = info.frame_rate,
            max_hands = self.extractor.options().max_hands,
            "Camera session active"
        );
        self.info = Some(info.clone());
        self.set_state(SessionState::Active);
        Ok(info)
    }

    /// Release the device and engine. Safe from any state, any number of times.
    pub fn stop(&mut self) -> SessionState {
        let current = self.state();
        if current != SessionState::Idle {
            self.set_state(SessionState::Stopping);
        }

        self.release();
        self.set_state(SessionState::Idle);

        if current != SessionState::Idle {
            info!(from = %current, "Camera session stopped");
        }
        SessionState::Idle
    }

    /// Stop and restart against another device. Only legal from `Active`.
    ///
    /// If the new device cannot be started the session is left `Idle`.
    pub async fn switch_device(&mut self, selector: &DeviceSelector) -> CaptureResult<DeviceInfo> {
        let current = self.state();
        if current != SessionState::Active {
            return Err(CaptureError::invalid_state("switch device", current));
        }

        info!(device = %selector, "Switching capture device");
        self.stop();
        self.start(selector).await
    }

    /// Wait for the next frame from the active device.
    pub async fn next_frame(&mut self) -> CaptureResult<Option<VideoFrame>> {
        let current = self.state();
        if current != SessionState::Active {
            return Err(CaptureError::invalid_state("read frames", current));
        }
        self.device.next_frame().await
    }

    /// Run landmark extraction on a frame from this session.
    pub fn extract(&mut self, frame: &VideoFrame) -> CaptureResult<ExtractionResult> {
        let current = self.state();
        if current != SessionState::Active {
            return Err(CaptureError::invalid_state("extract", current));
        }
        self.extractor.extract(frame)
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.release();
    }
}
