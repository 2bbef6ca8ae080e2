//! Replay of recorded capture sessions.
//!
//! A recording is a JSON lines file with one frame per line:
//!
//! ```json
//! {"timestamp_ms": 0, "image": "frames/0001.png", "hands": [[{"x": 0.5, "y": 0.4, "z": 0.0}, ...]]}
//! {"timestamp_ms": 33, "width": 640, "height": 480, "hands": []}
//! ```
//!
//! `image` paths are resolved relative to the recording file. Lines without
//! an image replay as black frames. [`ReplayCapture`] yields the frames at
//! their recorded times and [`RecordedEngine`] answers extraction with the
//! recorded hands, so a session can be driven end to end without hardware.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use mano_models::{DeviceSelector, Landmark, VideoFrame};

use crate::device::{CaptureDevice, DeviceInfo};
use crate::error::{CaptureError, CaptureResult};
use crate::extractor::{EngineOptions, ExtractionEngine};

/// One recorded frame.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordedFrame {
    /// Offset from the start of the recording
    pub timestamp_ms: u64,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    /// Image file for this frame
    #[serde(default)]
    pub image: Option<PathBuf>,
    /// Raw engine output for this frame, one landmark list per hand
    #[serde(default)]
    pub hands: Vec<Vec<Landmark>>,
}

/// A parsed recording.
#[derive(Debug, Clone)]
pub struct Recording {
    path: PathBuf,
    frames: Vec<RecordedFrame>,
}

impl Recording {
    /// Read and validate a recording file.
    pub fn load(path: impl AsRef<Path>) -> CaptureResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CaptureError::replay(path, e.to_string()))?;
        Self::parse(path, &contents)
    }

    fn parse(path: &Path, contents: &str) -> CaptureResult<Self> {
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let mut frames: Vec<RecordedFrame> = Vec::new();

        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let mut frame: RecordedFrame = serde_json::from_str(line)
                .map_err(|e| CaptureError::replay(path, format!("line {}: {}", index + 1, e)))?;

            if let Some(last) = frames.last() {
                if frame.timestamp_ms < last.timestamp_ms {
                    return Err(CaptureError::replay(
                        path,
                        format!("line {}: timestamp goes backwards", index + 1),
                    ));
                }
            }

            if let Some(image) = frame.image.take() {
                frame.image = Some(if image.is_relative() {
                    base.join(image)
                } else {
                    image
                });
            }

            frames.push(frame);
        }

        if frames.is_empty() {
            return Err(CaptureError::replay(path, "recording has no frames"));
        }

        Ok(Self {
            path: path.to_path_buf(),
            frames,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames(&self) -> &[RecordedFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Time between the first and last frame.
    pub fn duration(&self) -> Duration {
        match (self.frames.first(), self.frames.last()) {
            (Some(first), Some(last)) => {
                Duration::from_millis(last.timestamp_ms - first.timestamp_ms)
            }
            _ => Duration::ZERO,
        }
    }

    fn frame_rate(&self) -> f32 {
        let secs = self.duration().as_secs_f32();
        if secs > 0.0 {
            (self.frames.len().saturating_sub(1)) as f32 / secs
        } else {
            0.0
        }
    }
}

/// Capture device that replays a [`Recording`] in real time.
///
/// Every `open` replays from the first frame. Frame sequence numbers are the
/// line positions in the recording.
pub struct ReplayCapture {
    recording: Arc<Recording>,
    width: u32,
    height: u32,
    cursor: usize,
    started: Option<Instant>,
}

impl ReplayCapture {
    /// `width` and `height` apply to frames that carry neither an image nor
    /// their own dimensions.
    pub fn new(recording: Arc<Recording>, width: u32, height: u32) -> Self {
        Self {
            recording,
            width,
            height,
            cursor: 0,
            started: None,
        }
    }

    async fn load_frame(&self, sequence: usize, entry: &RecordedFrame) -> CaptureResult<VideoFrame> {
        let captured_at = Duration::from_millis(entry.timestamp_ms);

        match &entry.image {
            Some(image) => {
                // Decoding runs off the async runtime.
                let path = image.clone();
                let pixels = tokio::task::spawn_blocking(move || {
                    image::open(&path).map(|decoded| decoded.to_rgb8())
                })
                .await
                .map_err(|e| {
                    CaptureError::replay(&self.recording.path, format!("image load task failed: {}", e))
                })?
                .map_err(|e| {
                    CaptureError::replay(&self.recording.path, format!("{}: {}", image.display(), e))
                })?;
                Ok(VideoFrame::new(sequence as u64, captured_at, pixels))
            }
            None => Ok(VideoFrame::blank(
                sequence as u64,
                captured_at,
                entry.width.unwrap_or(self.width),
                entry.height.unwrap_or(self.height),
            )),
        }
    }
}

#[async_trait]
impl CaptureDevice for ReplayCapture {
    async fn open(&mut self, selector: &DeviceSelector) -> CaptureResult<DeviceInfo> {
        self.cursor = 0;
        self.started = Some(Instant::now());

        info!(
            path = %self.recording.path.display(),
            frames = self.recording.len(),
            duration_ms = self.recording.duration().as_millis() as u64,
            "Replaying recording"
        );

        Ok(DeviceInfo {
            selector: selector.clone(),
            label: format!("replay:{}", self.recording.path.display()),
            width: self.width,
            height: self.height,
            frame_rate: self.recording.frame_rate(),
        })
    }

    async fn next_frame(&mut self) -> CaptureResult<Option<VideoFrame>> {
        let Some(started) = self.started else {
            return Ok(None);
        };
        let recording = Arc::clone(&self.recording);
        let Some(entry) = recording.frames.get(self.cursor) else {
            debug!("Recording exhausted");
            return Ok(None);
        };

        sleep_until(started + Duration::from_millis(entry.timestamp_ms)).await;

        let frame = self.load_frame(self.cursor, entry).await?;
        self.cursor += 1;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        self.started = None;
    }
}

/// Extraction engine that answers with the hands stored in a [`Recording`].
pub struct RecordedEngine {
    recording: Arc<Recording>,
    configured: bool,
}

impl RecordedEngine {
    pub fn new(recording: Arc<Recording>) -> Self {
        Self {
            recording,
            configured: false,
        }
    }
}

impl ExtractionEngine for RecordedEngine {
    fn configure(&mut self, options: &EngineOptions) -> CaptureResult<()> {
        debug!(max_hands = options.max_hands, "Recorded engine configured");
        self.configured = true;
        Ok(())
    }

    fn process(&mut self, frame: &VideoFrame) -> CaptureResult<Vec<Vec<Landmark>>> {
        if !self.configured {
            return Err(CaptureError::extraction_failed("engine is closed"));
        }

        usize::try_from(frame.sequence)
            .ok()
            .and_then(|i| self.recording.frames.get(i))
            .map(|entry| entry.hands.clone())
            .ok_or_else(|| {
                CaptureError::extraction_failed(format!(
                    "no recorded frame with sequence {}",
                    frame.sequence
                ))
            })
    }

    fn close(&mut self) {
        self.configured = false;
    }
}
