//! End-to-end pipeline scenarios.
//!
//! Frames come from an in-process `ChannelCapture`; hands come from a queue
//! the test fills; classification goes either to an in-process fake or to
//! the real HTTP client against a wiremock server.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, Semaphore};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mano_capture::{
    CaptureError, CaptureResult, ChannelCapture, EngineOptions, ExtractionEngine, FrameFeed,
};
use mano_ml_client::{Classifier, FailureKind, InferenceClient, InferenceClientConfig, MlResult};
use mano_models::{
    ClassificationPayload, DeviceSelector, Landmark, PayloadMode, PredictedSign, SessionState,
    VideoFrame, LANDMARKS_PER_HAND, VALUES_PER_HAND,
};
use mano_pipeline::{
    CompletionOutcome, ControllerPhase, PipelineConfig, PipelineController, PipelineError,
    RejectReason, TickOutcome,
};

// ============================================================================
// Fixtures
// ============================================================================

/// Engine that reports the next queued hand count for each frame.
struct QueueEngine {
    hands: Arc<Mutex<VecDeque<usize>>>,
    calls: Arc<AtomicUsize>,
}

impl ExtractionEngine for QueueEngine {
    fn configure(&mut self, _options: &EngineOptions) -> CaptureResult<()> {
        Ok(())
    }

    fn process(&mut self, _frame: &VideoFrame) -> CaptureResult<Vec<Vec<Landmark>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let count = self.hands.lock().unwrap().pop_front().unwrap_or(0);
        Ok((0..count)
            .map(|h| {
                (0..LANDMARKS_PER_HAND)
                    .map(|i| Landmark::new(0.1 * (h + 1) as f32, i as f32 / 21.0, 0.0))
                    .collect()
            })
            .collect())
    }

    fn close(&mut self) {}
}

/// Classifier that holds every call until the test releases a permit.
struct GatedClassifier {
    label: &'static str,
    gate: Semaphore,
    calls: AtomicUsize,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl GatedClassifier {
    fn new(label: &'static str) -> Arc<Self> {
        Arc::new(Self {
            label,
            gate: Semaphore::new(0),
            calls: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
        })
    }

    fn release_one(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl Classifier for GatedClassifier {
    async fn classify(&self, _payload: &ClassificationPayload) -> MlResult<PredictedSign> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(running, Ordering::SeqCst);

        self.gate.acquire().await.unwrap().forget();

        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(PredictedSign::single(self.label))
    }
}

struct Harness {
    controller: PipelineController,
    hands: Arc<Mutex<VecDeque<usize>>>,
    extractions: Arc<AtomicUsize>,
    feed: FrameFeed,
}

impl Harness {
    fn new(cooldown: Duration, classifier: Arc<dyn Classifier>) -> Self {
        Self::with_mode(cooldown, PayloadMode::Landmarks, classifier)
    }

    fn with_mode(cooldown: Duration, mode: PayloadMode, classifier: Arc<dyn Classifier>) -> Self {
        let (device, feed) = ChannelCapture::new(4, 32, 24, 30.0);
        let device = device.with_available(vec![DeviceSelector::Front, DeviceSelector::Back]);
        let hands = Arc::new(Mutex::new(VecDeque::new()));
        let extractions = Arc::new(AtomicUsize::new(0));
        let config = PipelineConfig {
            cooldown,
            mode,
            ..Default::default()
        };
        let engine = QueueEngine {
            hands: Arc::clone(&hands),
            calls: Arc::clone(&extractions),
        };
        let controller =
            PipelineController::from_config(&config, Box::new(device), Box::new(engine), classifier);

        Self {
            controller,
            hands,
            extractions,
            feed,
        }
    }

    /// Queue the hand count for the next frame and tick it.
    fn tick_with_hands(&mut self, hands: usize, sequence: u64) -> TickOutcome {
        self.hands.lock().unwrap().push_back(hands);
        self.controller.tick(&frame(sequence)).unwrap()
    }

    /// Wait for the next completion and apply it.
    async fn complete(&mut self) -> CompletionOutcome {
        let completion = self.controller.next_completion().await.unwrap();
        self.controller.apply_completion(completion)
    }

    fn current_sign(&self) -> Option<String> {
        self.controller.current_prediction().current_sign
    }
}

fn frame(sequence: u64) -> VideoFrame {
    VideoFrame::blank(sequence, Duration::from_millis(sequence * 33), 32, 24)
}

fn http_classifier(server: &MockServer) -> Arc<dyn Classifier> {
    let config = InferenceClientConfig {
        base_url: server.uri(),
        timeout: Duration::from_secs(5),
        ..Default::default()
    };
    Arc::new(InferenceClient::new(config).unwrap())
}

// ============================================================================
// Dispatch gating
// ============================================================================

#[tokio::test]
async fn zero_hand_frames_never_dispatch() {
    let classifier = GatedClassifier::new("A");
    let mut h = Harness::new(Duration::ZERO, classifier.clone());
    h.controller.start(&DeviceSelector::Front).await.unwrap();

    for seq in 0..20 {
        assert_eq!(h.tick_with_hands(0, seq), TickOutcome::NoHands);
    }
    tokio::task::yield_now().await;

    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.controller.phase(), ControllerPhase::Ready);
}

#[tokio::test(start_paused = true)]
async fn no_admission_within_cooldown() {
    let classifier = GatedClassifier::new("A");
    let mut h = Harness::new(Duration::from_millis(1000), classifier.clone());
    h.controller.start(&DeviceSelector::Front).await.unwrap();

    assert!(matches!(h.tick_with_hands(1, 0), TickOutcome::Dispatched { .. }));
    classifier.release_one();
    assert_eq!(h.complete().await, CompletionOutcome::Updated);

    tokio::time::advance(Duration::from_millis(500)).await;
    assert_eq!(
        h.tick_with_hands(1, 1),
        TickOutcome::Throttled(RejectReason::CoolingDown {
            remaining: Duration::from_millis(500)
        })
    );

    tokio::time::advance(Duration::from_millis(499)).await;
    assert!(matches!(
        h.tick_with_hands(1, 2),
        TickOutcome::Throttled(RejectReason::CoolingDown { .. })
    ));

    tokio::time::advance(Duration::from_millis(1)).await;
    assert!(matches!(h.tick_with_hands(1, 3), TickOutcome::Dispatched { .. }));
}

#[tokio::test]
async fn at_most_one_request_in_flight() {
    let classifier = GatedClassifier::new("A");
    let mut h = Harness::new(Duration::ZERO, classifier.clone());
    h.controller.start(&DeviceSelector::Front).await.unwrap();

    assert!(matches!(h.tick_with_hands(1, 0), TickOutcome::Dispatched { .. }));
    for seq in 1..10 {
        assert_eq!(
            h.tick_with_hands(2, seq),
            TickOutcome::Throttled(RejectReason::InFlight)
        );
        tokio::task::yield_now().await;
    }
    assert_eq!(h.controller.phase(), ControllerPhase::Dispatching);

    classifier.release_one();
    assert_eq!(h.complete().await, CompletionOutcome::Updated);
    assert_eq!(h.controller.phase(), ControllerPhase::Ready);

    assert!(matches!(h.tick_with_hands(1, 10), TickOutcome::Dispatched { .. }));
    assert_eq!(
        h.tick_with_hands(1, 11),
        TickOutcome::Throttled(RejectReason::InFlight)
    );
    classifier.release_one();
    h.complete().await;

    assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
    assert_eq!(classifier.max_running.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Stale results
// ============================================================================

#[tokio::test]
async fn stop_during_flight_discards_result() {
    let classifier = GatedClassifier::new("LATE");
    let mut h = Harness::new(Duration::from_millis(1000), classifier.clone());
    let prediction = h.controller.prediction();
    h.controller.start(&DeviceSelector::Front).await.unwrap();

    let TickOutcome::Dispatched { epoch } = h.tick_with_hands(1, 0) else {
        panic!("expected dispatch");
    };
    h.controller.stop();
    assert_eq!(h.controller.phase(), ControllerPhase::Idle);

    classifier.release_one();
    let completion = h.controller.next_completion().await.unwrap();
    assert_eq!(completion.epoch, epoch);
    assert_eq!(
        h.controller.apply_completion(completion),
        CompletionOutcome::Discarded
    );

    assert_eq!(h.current_sign(), None);
    assert!(!prediction.has_changed().unwrap());

    // A restarted session may dispatch straight away.
    h.controller.start(&DeviceSelector::Front).await.unwrap();
    assert!(matches!(h.tick_with_hands(1, 1), TickOutcome::Dispatched { .. }));
}

#[tokio::test]
async fn switch_resets_throttle_but_keeps_prediction() {
    let classifier = GatedClassifier::new("L");
    let mut h = Harness::new(Duration::from_millis(1000), classifier.clone());
    h.controller.start(&DeviceSelector::Front).await.unwrap();

    h.tick_with_hands(1, 0);
    classifier.release_one();
    assert_eq!(h.complete().await, CompletionOutcome::Updated);
    assert!(matches!(
        h.tick_with_hands(1, 1),
        TickOutcome::Throttled(RejectReason::CoolingDown { .. })
    ));

    h.controller.switch_device(&DeviceSelector::Back).await.unwrap();
    assert_eq!(h.current_sign().as_deref(), Some("L"));
    assert!(matches!(h.tick_with_hands(1, 2), TickOutcome::Dispatched { .. }));
}

#[tokio::test]
async fn switch_during_flight_discards_result() {
    let classifier = GatedClassifier::new("OLD");
    let mut h = Harness::new(Duration::ZERO, classifier.clone());
    h.controller.start(&DeviceSelector::Front).await.unwrap();

    h.tick_with_hands(1, 0);
    h.controller.switch_device(&DeviceSelector::Back).await.unwrap();

    // The new device dispatches while the old request is still held.
    assert!(matches!(h.tick_with_hands(1, 1), TickOutcome::Dispatched { .. }));

    classifier.release_one();
    classifier.release_one();
    let mut outcomes = vec![h.complete().await, h.complete().await];
    outcomes.sort_by_key(|o| matches!(o, CompletionOutcome::Updated));

    assert_eq!(
        outcomes,
        vec![CompletionOutcome::Discarded, CompletionOutcome::Updated]
    );
    assert_eq!(h.controller.phase(), ControllerPhase::Ready);
}

// ============================================================================
// Classifier responses over HTTP
// ============================================================================

#[tokio::test]
async fn sign_labels_are_joined() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "signs": ["A", "B"] })),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "sign": "A" })))
        .with_priority(2)
        .mount(&server)
        .await;

    let mut h = Harness::new(Duration::ZERO, http_classifier(&server));
    h.controller.start(&DeviceSelector::Front).await.unwrap();

    h.tick_with_hands(2, 0);
    assert_eq!(h.complete().await, CompletionOutcome::Updated);
    assert_eq!(h.current_sign().as_deref(), Some("A / B"));

    h.tick_with_hands(1, 1);
    assert_eq!(h.complete().await, CompletionOutcome::Updated);
    assert_eq!(h.current_sign().as_deref(), Some("A"));
}

#[tokio::test]
async fn network_error_keeps_sign_and_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "sign": "A" })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "sign": "B" })))
        .with_priority(3)
        .mount(&server)
        .await;

    let mut h = Harness::new(Duration::ZERO, http_classifier(&server));
    h.controller.start(&DeviceSelector::Front).await.unwrap();

    h.tick_with_hands(1, 0);
    assert_eq!(h.complete().await, CompletionOutcome::Updated);

    h.tick_with_hands(1, 1);
    assert_eq!(
        h.complete().await,
        CompletionOutcome::Failed(FailureKind::Network)
    );
    assert_eq!(h.current_sign().as_deref(), Some("A"));

    assert!(matches!(h.tick_with_hands(1, 2), TickOutcome::Dispatched { .. }));
    assert_eq!(h.complete().await, CompletionOutcome::Updated);
    assert_eq!(h.current_sign().as_deref(), Some("B"));
}

#[tokio::test]
async fn unreachable_service_is_network_failure() {
    let config = InferenceClientConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        timeout: Duration::from_secs(2),
        connect_timeout: Duration::from_millis(500),
        ..Default::default()
    };
    let classifier: Arc<dyn Classifier> = Arc::new(InferenceClient::new(config).unwrap());
    let mut h = Harness::new(Duration::ZERO, classifier);
    h.controller.start(&DeviceSelector::Front).await.unwrap();

    h.tick_with_hands(1, 0);
    assert_eq!(
        h.complete().await,
        CompletionOutcome::Failed(FailureKind::Network)
    );
    assert_eq!(h.current_sign(), None);
    assert_eq!(h.controller.phase(), ControllerPhase::Ready);
}

#[tokio::test]
async fn single_hand_round_trip_then_cooldown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "signs": ["L"] })))
        .expect(1)
        .mount(&server)
        .await;

    let mut h = Harness::new(Duration::from_millis(1000), http_classifier(&server));
    h.controller.start(&DeviceSelector::Front).await.unwrap();

    assert!(matches!(h.tick_with_hands(1, 0), TickOutcome::Dispatched { .. }));
    assert_eq!(h.complete().await, CompletionOutcome::Updated);
    assert_eq!(h.current_sign().as_deref(), Some("L"));

    let TickOutcome::Throttled(RejectReason::CoolingDown { remaining }) = h.tick_with_hands(1, 1)
    else {
        panic!("expected cooldown rejection");
    };
    assert!(remaining > Duration::from_millis(500));
    assert_eq!(h.current_sign().as_deref(), Some("L"));

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let vectors = body["landmarks"].as_array().unwrap();
    assert_eq!(vectors.len(), 1);
    assert_eq!(vectors[0].as_array().unwrap().len(), VALUES_PER_HAND);
}

#[tokio::test]
async fn image_mode_sends_data_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "sign": "Y" })))
        .expect(1)
        .mount(&server)
        .await;

    let mut h = Harness::with_mode(Duration::ZERO, PayloadMode::Image, http_classifier(&server));
    h.controller.start(&DeviceSelector::Front).await.unwrap();

    assert_eq!(h.tick_with_hands(0, 0), TickOutcome::NoHands);
    h.tick_with_hands(1, 1);
    assert_eq!(h.complete().await, CompletionOutcome::Updated);

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body["image"]
        .as_str()
        .unwrap()
        .starts_with("data:image/jpeg;base64,"));
}

// ============================================================================
// Running controller
// ============================================================================

/// Classifier that answers immediately.
struct EchoClassifier;

#[async_trait]
impl Classifier for EchoClassifier {
    async fn classify(&self, payload: &ClassificationPayload) -> MlResult<PredictedSign> {
        Ok(PredictedSign::single(format!("hands:{}", payload.hand_count())))
    }
}

async fn wait_until<F>(mut check: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn handle_drives_running_controller() {
    let h = Harness::new(Duration::ZERO, Arc::new(EchoClassifier));
    let Harness {
        controller,
        hands,
        extractions,
        feed,
    } = h;
    let handle = controller.handle();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(controller.run(shutdown_rx));

    let info = handle.start(DeviceSelector::Front).await.unwrap();
    assert_eq!((info.width, info.height), (32, 24));
    assert_eq!(*handle.session_state().borrow(), SessionState::Active);

    hands.lock().unwrap().push_back(2);
    assert!(feed.push(frame(0)));

    let mut prediction = handle.prediction();
    tokio::time::timeout(Duration::from_secs(5), prediction.wait_for(|p| p.has_sign()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        prediction.borrow().current_sign.as_deref(),
        Some("hands:1")
    );

    let info = handle.toggle_camera().await.unwrap();
    assert_eq!(info.selector, DeviceSelector::Back);
    assert_eq!(
        handle.prediction().borrow().current_sign.as_deref(),
        Some("hands:1")
    );

    // Empty frames are extracted but change nothing.
    feed.push(frame(1));
    wait_until(|| extractions.load(Ordering::SeqCst) >= 2).await;
    assert_eq!(
        handle.prediction().borrow().current_sign.as_deref(),
        Some("hands:1")
    );

    handle.stop().await.unwrap();
    assert_eq!(*handle.session_state().borrow(), SessionState::Idle);
    assert!(!feed.push(frame(2)));

    shutdown_tx.send(true).unwrap();
    task.await.unwrap().unwrap();

    let err = handle.start(DeviceSelector::Front).await.unwrap_err();
    assert!(matches!(err, PipelineError::ChannelClosed(_)));
}

#[tokio::test]
async fn ended_stream_stops_session() {
    let h = Harness::new(Duration::ZERO, Arc::new(EchoClassifier));
    let Harness {
        controller, feed, ..
    } = h;
    let handle = controller.handle();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(controller.run(shutdown_rx));

    handle.start(DeviceSelector::Front).await.unwrap();
    drop(feed);

    let mut states = handle.session_state();
    tokio::time::timeout(
        Duration::from_secs(5),
        states.wait_for(|s| *s == SessionState::Idle),
    )
    .await
    .unwrap()
    .unwrap();
}

#[tokio::test]
async fn unavailable_device_leaves_controller_idle() {
    let h = Harness::new(Duration::ZERO, Arc::new(EchoClassifier));
    let handle = h.controller.handle();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(h.controller.run(shutdown_rx));

    let err = handle.start(DeviceSelector::Index(3)).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Capture(CaptureError::DeviceUnavailable(_))
    ));
    assert_eq!(*handle.session_state().borrow(), SessionState::Idle);
}
