//! Prometheus metrics for the pipeline.

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use mano_ml_client::FailureKind;
use mano_models::PayloadMode;

use crate::error::{PipelineError, PipelineResult};
use crate::throttle::RejectReason;

/// Install the Prometheus recorder with an HTTP scrape listener on `addr`.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> PipelineResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| PipelineError::config_error(format!("metrics exporter: {}", e)))
}

/// Metric names as constants for consistency.
pub mod names {
    // Session metrics
    pub const SESSION_ACTIVE: &str = "mano_session_active";
    pub const SESSION_STARTS_TOTAL: &str = "mano_session_starts_total";

    // Frame metrics
    pub const FRAMES_PROCESSED_TOTAL: &str = "mano_frames_processed_total";
    pub const FRAMES_WITHOUT_HANDS_TOTAL: &str = "mano_frames_without_hands_total";
    pub const EXTRACTION_FAILURES_TOTAL: &str = "mano_extraction_failures_total";
    pub const THROTTLED_TOTAL: &str = "mano_throttled_total";

    // Classification metrics
    pub const DISPATCHES_TOTAL: &str = "mano_dispatches_total";
    pub const CLASSIFICATIONS_TOTAL: &str = "mano_classifications_total";
    pub const STALE_COMPLETIONS_TOTAL: &str = "mano_stale_completions_total";
    pub const CLASSIFY_DURATION_SECONDS: &str = "mano_classify_duration_seconds";
}

/// Update the active session gauge.
pub fn set_session_active(active: bool) {
    gauge!(names::SESSION_ACTIVE).set(if active { 1.0 } else { 0.0 });
}

/// Record a session start attempt.
pub fn record_session_start(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::SESSION_STARTS_TOTAL, &labels).increment(1);
}

pub fn record_frame_processed() {
    counter!(names::FRAMES_PROCESSED_TOTAL).increment(1);
}

pub fn record_no_hands() {
    counter!(names::FRAMES_WITHOUT_HANDS_TOTAL).increment(1);
}

pub fn record_extraction_failure() {
    counter!(names::EXTRACTION_FAILURES_TOTAL).increment(1);
}

/// Record a frame rejected by the throttle.
pub fn record_throttled(reason: &RejectReason) {
    let labels = [("reason", reason.as_str().to_string())];
    counter!(names::THROTTLED_TOTAL, &labels).increment(1);
}

/// Record a dispatched classification request.
pub fn record_dispatch(mode: PayloadMode) {
    let labels = [("mode", mode.as_str().to_string())];
    counter!(names::DISPATCHES_TOTAL, &labels).increment(1);
}

/// Record a classification result applied to the current session.
pub fn record_classification(failure: Option<FailureKind>, duration_secs: f64) {
    let outcome = failure.map(|k| k.as_str()).unwrap_or("success");
    let labels = [("outcome", outcome.to_string())];
    counter!(names::CLASSIFICATIONS_TOTAL, &labels).increment(1);
    histogram!(names::CLASSIFY_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a completion discarded because its session epoch had ended.
pub fn record_stale_completion() {
    counter!(names::STALE_COMPLETIONS_TOTAL).increment(1);
}
