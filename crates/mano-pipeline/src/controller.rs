//! Pipeline controller.
//!
//! The controller owns the camera session, payload builder, throttle and
//! prediction state, and runs everything on one task. Each frame is one
//! tick: extract, build, admit, and (if admitted) spawn the classify call.
//! Completions come back through a channel and are applied on the same task,
//! after an epoch check that drops results from a stopped or switched
//! session.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, field, info, warn, Instrument, Span};

use mano_capture::{
    BuildOutcome, CameraSession, CaptureDevice, CaptureError, DeviceInfo, ExtractionEngine,
    FrameExtractor, PayloadBuilder,
};
use mano_ml_client::{Classifier, FailureKind, MlResult};
use mano_models::{
    DeviceSelector, Epoch, PredictedSign, PredictionState, SessionState, Stamped, VideoFrame,
};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::SessionLogger;
use crate::metrics;
use crate::throttle::{Admission, RejectReason, RequestThrottler};

/// Capacity of the completion channel. Each epoch has at most one request
/// outstanding, so this only fills if many switches happen mid-request.
const COMPLETION_BUFFER: usize = 8;

const COMMAND_BUFFER: usize = 16;

/// A classification result tagged with the epoch it was dispatched in.
pub type Completion = Stamped<MlResult<PredictedSign>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    /// Session not active
    Idle,
    /// Session active, nothing in flight
    Ready,
    /// Session active, one request outstanding
    Dispatching,
}

impl fmt::Display for ControllerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ControllerPhase::Idle => "idle",
            ControllerPhase::Ready => "ready",
            ControllerPhase::Dispatching => "dispatching",
        };
        f.write_str(s)
    }
}

/// What happened to one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The engine failed on this frame; it was dropped
    ExtractionFailed,
    /// No hands in the frame
    NoHands,
    /// The throttle rejected the frame
    Throttled(RejectReason),
    /// A classify request was spawned
    Dispatched { epoch: u64 },
}

/// What applying a completion did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The completion belonged to an earlier epoch and was ignored
    Discarded,
    /// The prediction was replaced
    Updated,
    /// The request failed; the previous prediction is kept
    Failed(FailureKind),
}

enum Command {
    Start {
        selector: DeviceSelector,
        reply: oneshot::Sender<PipelineResult<DeviceInfo>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    SwitchDevice {
        selector: DeviceSelector,
        reply: oneshot::Sender<PipelineResult<DeviceInfo>>,
    },
    ToggleCamera {
        reply: oneshot::Sender<PipelineResult<DeviceInfo>>,
    },
}

pub struct PipelineController {
    session: CameraSession,
    builder: PayloadBuilder,
    throttle: RequestThrottler,
    classifier: Arc<dyn Classifier>,
    epoch: Epoch,
    prediction: watch::Sender<PredictionState>,
    completions_tx: mpsc::Sender<Completion>,
    completions_rx: mpsc::Receiver<Completion>,
    commands_tx: mpsc::Sender<Command>,
    commands_rx: mpsc::Receiver<Command>,
    selector: DeviceSelector,
    logger: Option<SessionLogger>,
    /// Span for the active session; disabled while idle
    span: Span,
}

impl PipelineController {
    pub fn new(
        session: CameraSession,
        builder: PayloadBuilder,
        throttle: RequestThrottler,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        let (prediction, _) = watch::channel(PredictionState::default());
        let (completions_tx, completions_rx) = mpsc::channel(COMPLETION_BUFFER);
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);

        Self {
            session,
            builder,
            throttle,
            classifier,
            epoch: Epoch::new(),
            prediction,
            completions_tx,
            completions_rx,
            commands_tx,
            commands_rx,
            selector: DeviceSelector::default(),
            logger: None,
            span: Span::none(),
        }
    }

    /// Build a controller and its session from configuration.
    pub fn from_config(
        config: &PipelineConfig,
        device: Box<dyn CaptureDevice>,
        engine: Box<dyn ExtractionEngine>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        let extractor = FrameExtractor::new(engine, config.engine_options(), config.extraction_budget);
        let mut controller = Self::new(
            CameraSession::new(device, extractor),
            PayloadBuilder::new(config.mode, config.jpeg_quality),
            RequestThrottler::new(config.cooldown),
            classifier,
        );
        controller.selector = config.device.clone();
        controller
    }

    /// Handle for driving this controller once it is running.
    pub fn handle(&self) -> PipelineHandle {
        PipelineHandle {
            commands: self.commands_tx.clone(),
            prediction: self.prediction.subscribe(),
            session_state: self.session.subscribe(),
        }
    }

    pub fn prediction(&self) -> watch::Receiver<PredictionState> {
        self.prediction.subscribe()
    }

    pub fn session_state(&self) -> watch::Receiver<SessionState> {
        self.session.subscribe()
    }

    /// Current prediction value.
    pub fn current_prediction(&self) -> PredictionState {
        self.prediction.borrow().clone()
    }

    pub fn phase(&self) -> ControllerPhase {
        if !self.session.state().is_active() {
            ControllerPhase::Idle
        } else if self.throttle.in_flight() {
            ControllerPhase::Dispatching
        } else {
            ControllerPhase::Ready
        }
    }

    /// Tracing span of the active session, disabled while idle.
    pub fn session_span(&self) -> &Span {
        &self.span
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.current()
    }

    /// Device selector used by the last start or switch.
    pub fn selector(&self) -> &DeviceSelector {
        &self.selector
    }

    pub async fn start(&mut self, selector: &DeviceSelector) -> PipelineResult<DeviceInfo> {
        match self.session.start(selector).await {
            Ok(info) => {
                let logger = SessionLogger::new(selector);
                self.span = logger.create_span();
                self.span.in_scope(|| logger.log_start(&info));
                self.logger = Some(logger);
                self.selector = selector.clone();
                metrics::record_session_start("ok");
                metrics::set_session_active(true);
                Ok(info)
            }
            Err(e) => {
                metrics::record_session_start(failure_label(&e));
                Err(e.into())
            }
        }
    }

    /// Stop the session. Any request still in flight is abandoned: its
    /// completion will be discarded.
    pub fn stop(&mut self) {
        let span = std::mem::replace(&mut self.span, Span::none());
        let _entered = span.enter();

        self.epoch.advance();
        self.throttle.reset();
        let was = self.session.state();
        self.session.stop();
        metrics::set_session_active(false);

        if let Some(logger) = self.logger.take() {
            logger.log_stop(&format!("from {}", was));
        }
    }

    /// Move the session to another device. The prediction is kept; the
    /// throttle starts over.
    pub async fn switch_device(&mut self, selector: &DeviceSelector) -> PipelineResult<DeviceInfo> {
        let state = self.session.state();
        if state != SessionState::Active {
            return Err(CaptureError::invalid_state("switch device", state).into());
        }

        self.epoch.advance();
        self.throttle.reset();
        let span = self.span.clone();
        if let Some(logger) = self.logger.as_mut() {
            span.in_scope(|| logger.log_switch(selector));
        }

        match self
            .session
            .switch_device(selector)
            .instrument(span.clone())
            .await
        {
            Ok(info) => {
                self.selector = selector.clone();
                span.record("device", field::display(selector));
                if let Some(logger) = &self.logger {
                    span.in_scope(|| logger.log_start(&info));
                }
                metrics::record_session_start("ok");
                Ok(info)
            }
            Err(e) => {
                metrics::record_session_start(failure_label(&e));
                metrics::set_session_active(false);
                self.span = Span::none();
                if let Some(logger) = self.logger.take() {
                    span.in_scope(|| {
                        logger.log_warning(&format!("switch failed: {}", e));
                        logger.log_stop("device switch failed");
                    });
                }
                Err(e.into())
            }
        }
    }

    /// Switch between the front and back camera.
    pub async fn toggle_camera(&mut self) -> PipelineResult<DeviceInfo> {
        let next = self.selector.toggled();
        self.switch_device(&next).await
    }

    /// Process one frame.
    ///
    /// Returns an error only when the session is not active or an image
    /// payload cannot be encoded; both leave every piece of state unchanged.
    pub fn tick(&mut self, frame: &VideoFrame) -> PipelineResult<TickOutcome> {
        let span = self.span.clone();
        let _entered = span.enter();
        metrics::record_frame_processed();

        let extraction = match self.session.extract(frame) {
            Ok(extraction) => extraction,
            Err(CaptureError::ExtractionFailure(msg)) => {
                warn!(sequence = frame.sequence, "Extraction failed, dropping frame: {}", msg);
                metrics::record_extraction_failure();
                return Ok(TickOutcome::ExtractionFailed);
            }
            Err(e) => return Err(e.into()),
        };

        let payload = match self.builder.build(&extraction)? {
            BuildOutcome::Skip => {
                metrics::record_no_hands();
                return Ok(TickOutcome::NoHands);
            }
            BuildOutcome::Payload(payload) => payload,
        };

        if let Admission::Rejected(reason) = self.throttle.try_admit() {
            debug!(sequence = frame.sequence, reason = %reason, "Frame throttled");
            metrics::record_throttled(&reason);
            return Ok(TickOutcome::Throttled(reason));
        }

        let epoch = self.epoch.current();
        let classifier = Arc::clone(&self.classifier);
        let completions = self.completions_tx.clone();

        debug!(
            sequence = frame.sequence,
            epoch,
            hands = extraction.hand_count(),
            mode = %payload.mode(),
            "Dispatching classification"
        );
        metrics::record_dispatch(payload.mode());

        let request = async move {
            let result = classifier.classify(&payload).await;
            if completions
                .send(Stamped {
                    epoch,
                    inner: result,
                })
                .await
                .is_err()
            {
                debug!(epoch, "Controller gone, dropping classification result");
            }
        };
        tokio::spawn(request.instrument(span.clone()));

        Ok(TickOutcome::Dispatched { epoch })
    }

    /// Wait for the next classification completion.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        self.completions_rx.recv().await
    }

    /// Apply a completion to the throttle and prediction state.
    pub fn apply_completion(&mut self, completion: Completion) -> CompletionOutcome {
        let span = self.span.clone();
        let _entered = span.enter();
        if !self.epoch.is_current(completion.epoch) {
            debug!(
                epoch = completion.epoch,
                current = self.epoch.current(),
                "Discarding stale classification result"
            );
            metrics::record_stale_completion();
            return CompletionOutcome::Discarded;
        }

        let elapsed = self
            .throttle
            .last_dispatch()
            .map(|at| at.elapsed().as_secs_f64())
            .unwrap_or_default();
        self.throttle.release();

        match completion.inner {
            Ok(sign) => {
                let state = PredictionState::updated(&sign, Utc::now());
                info!(epoch = completion.epoch, sign = %sign, "Prediction updated");
                self.prediction.send_replace(state);
                metrics::record_classification(None, elapsed);
                CompletionOutcome::Updated
            }
            Err(e) => {
                let kind = e.kind();
                warn!(
                    epoch = completion.epoch,
                    kind = kind.as_str(),
                    "Classification failed, keeping previous prediction: {}",
                    e
                );
                metrics::record_classification(Some(kind), elapsed);
                CompletionOutcome::Failed(kind)
            }
        }
    }

    /// Drive the controller until `shutdown` flips to `true` or its sender
    /// is dropped. The session is stopped on exit.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> PipelineResult<()> {
        info!(
            mode = %self.builder.mode(),
            cooldown_ms = self.throttle.cooldown().as_millis() as u64,
            "Pipeline controller running"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let active = self.session.state().is_active();

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                Some(command) = self.commands_rx.recv() => {
                    self.handle_command(command).await;
                }
                Some(completion) = self.completions_rx.recv() => {
                    self.apply_completion(completion);
                }
                frame = self.session.next_frame(), if active => {
                    match frame {
                        Ok(Some(frame)) => {
                            if let Err(e) = self.tick(&frame) {
                                warn!(sequence = frame.sequence, "Frame skipped: {}", e);
                            }
                        }
                        Ok(None) => {
                            info!("Capture stream ended");
                            self.stop();
                        }
                        Err(e) => {
                            warn!("Capture device failed: {}", e);
                            self.stop();
                        }
                    }
                }
            }
        }

        self.stop();
        info!("Pipeline controller stopped");
        Ok(())
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start { selector, reply } => {
                let result = self.start(&selector).await;
                let _ = reply.send(result);
            }
            Command::Stop { reply } => {
                self.stop();
                let _ = reply.send(());
            }
            Command::SwitchDevice { selector, reply } => {
                let result = self.switch_device(&selector).await;
                let _ = reply.send(result);
            }
            Command::ToggleCamera { reply } => {
                let result = self.toggle_camera().await;
                let _ = reply.send(result);
            }
        }
    }
}

fn failure_label(error: &CaptureError) -> &'static str {
    match error {
        CaptureError::DeviceUnavailable(_) => "unavailable",
        CaptureError::InvalidState { .. } => "invalid_state",
        _ => "error",
    }
}

/// Cloneable handle to a running [`PipelineController`].
#[derive(Clone)]
pub struct PipelineHandle {
    commands: mpsc::Sender<Command>,
    prediction: watch::Receiver<PredictionState>,
    session_state: watch::Receiver<SessionState>,
}

impl PipelineHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> PipelineResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| PipelineError::channel_closed("command channel closed"))?;
        response
            .await
            .map_err(|_| PipelineError::channel_closed("controller dropped the request"))
    }

    pub async fn start(&self, selector: DeviceSelector) -> PipelineResult<DeviceInfo> {
        self.request(|reply| Command::Start { selector, reply }).await?
    }

    pub async fn stop(&self) -> PipelineResult<()> {
        self.request(|reply| Command::Stop { reply }).await
    }

    pub async fn switch_device(&self, selector: DeviceSelector) -> PipelineResult<DeviceInfo> {
        self.request(|reply| Command::SwitchDevice { selector, reply })
            .await?
    }

    pub async fn toggle_camera(&self) -> PipelineResult<DeviceInfo> {
        self.request(|reply| Command::ToggleCamera { reply }).await?
    }

    pub fn prediction(&self) -> watch::Receiver<PredictionState> {
        self.prediction.clone()
    }

    pub fn session_state(&self) -> watch::Receiver<SessionState> {
        self.session_state.clone()
    }
}
