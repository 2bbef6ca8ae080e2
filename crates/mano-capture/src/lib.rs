//! Capture side of the ManoLingua pipeline.
//!
//! This crate provides:
//! - Camera session lifecycle over an abstract capture device
//! - Hand landmark extraction through a pluggable engine
//! - Classification payload construction (landmark vectors or JPEG frames)
//! - In-process and replay capture devices

pub mod channel;
pub mod device;
pub mod error;
pub mod extractor;
pub mod payload;
pub mod replay;
pub mod session;

pub use channel::{ChannelCapture, FrameFeed, DEFAULT_FRAME_BUFFER};
pub use device::{CaptureDevice, DeviceInfo};
pub use error::{CaptureError, CaptureResult};
pub use extractor::{EngineOptions, ExtractionEngine, FrameExtractor};
pub use payload::{BuildOutcome, PayloadBuilder, DEFAULT_JPEG_QUALITY};
pub use replay::{RecordedEngine, RecordedFrame, Recording, ReplayCapture};
pub use session::CameraSession;
