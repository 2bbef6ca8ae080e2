//! Structured session logging utilities.
//!
//! Provides consistent, structured logging for camera session lifecycle
//! events with tracing spans and contextual information.

use tracing::{info, warn, Span};
use uuid::Uuid;

use mano_capture::DeviceInfo;
use mano_models::DeviceSelector;

/// Session logger for structured logging with consistent formatting.
///
/// Every event carries the session id and the selected device, so log lines
/// from one start/stop cycle can be grouped.
#[derive(Debug, Clone)]
pub struct SessionLogger {
    session_id: String,
    device: DeviceSelector,
}

impl SessionLogger {
    /// Create a logger for a new session on `device`.
    pub fn new(device: &DeviceSelector) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            device: device.clone(),
        }
    }

    /// Log a successful session start.
    pub fn log_start(&self, info: &DeviceInfo) {
        info!(
            session_id = %self.session_id,
            device = %self.device,
            facing = self.device.facing_mode().unwrap_or("none"),
            width = info.width,
            height = info.height,
            "Session started: {}", info.label
        );
    }

    /// Log a move to another device within the same session.
    pub fn log_switch(&mut self, to: &DeviceSelector) {
        info!(
            session_id = %self.session_id,
            from = %self.device,
            to = %to,
            "Session switching device"
        );
        self.device = to.clone();
    }

    /// Log a warning during the session.
    pub fn log_warning(&self, message: &str) {
        warn!(
            session_id = %self.session_id,
            device = %self.device,
            "Session warning: {}", message
        );
    }

    /// Log the end of the session.
    pub fn log_stop(&self, reason: &str) {
        info!(
            session_id = %self.session_id,
            device = %self.device,
            "Session stopped: {}", reason
        );
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn device(&self) -> &DeviceSelector {
        &self.device
    }

    /// Create a tracing span for this session. The `device` field is
    /// re-recorded when the session switches device.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "session",
            session_id = %self.session_id,
            device = %self.device
        )
    }
}
