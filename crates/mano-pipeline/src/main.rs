//! Sign classification pipeline binary.
//!
//! Replays a recorded capture session through the pipeline against the
//! configured classifier service and logs every prediction change.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mano_capture::{RecordedEngine, Recording, ReplayCapture};
use mano_ml_client::InferenceClient;
use mano_models::SessionState;
use mano_pipeline::{metrics, PipelineConfig, PipelineController};

fn init_tracing() -> anyhow::Result<()> {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("mano=info".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for HTTPS classifier endpoints)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing()?;

    info!("Starting mano-pipeline");

    if let Ok(addr) = std::env::var("METRICS_ADDR") {
        let addr: SocketAddr = addr
            .parse()
            .with_context(|| format!("Invalid METRICS_ADDR '{}'", addr))?;
        metrics::init_metrics(addr)?;
        info!(%addr, "Metrics exporter listening");
    }

    let config = PipelineConfig::from_env();
    config.validate()?;
    info!("Pipeline config: {:?}", config);

    let replay_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("MANO_REPLAY_PATH").ok())
        .context("No recording given: pass a path or set MANO_REPLAY_PATH")?;
    let recording = Arc::new(Recording::load(&replay_path)?);

    let client = InferenceClient::from_env()?;
    match client.health_check().await {
        Ok(true) => info!(url = %client.config().base_url, "Classifier service is healthy"),
        Ok(false) => warn!(url = %client.config().base_url, "Classifier service reports unhealthy"),
        Err(e) => warn!(url = %client.config().base_url, "Classifier health check failed: {}", e),
    }

    let device = ReplayCapture::new(
        Arc::clone(&recording),
        config.frame_width,
        config.frame_height,
    );
    let engine = RecordedEngine::new(recording);
    let controller = PipelineController::from_config(
        &config,
        Box::new(device),
        Box::new(engine),
        Arc::new(client),
    );
    let handle = controller.handle();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let controller_task = tokio::spawn(controller.run(shutdown_rx));

    let mut predictions = handle.prediction();
    tokio::spawn(async move {
        while predictions.changed().await.is_ok() {
            let state = predictions.borrow_and_update().clone();
            if let Some(sign) = state.current_sign {
                info!(sign = %sign, "Current sign");
            }
        }
    });

    handle.start(config.device.clone()).await?;

    let mut states = handle.session_state();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        _ = states.wait_for(|state| *state == SessionState::Idle) => {
            info!("Recording finished");
        }
    }

    shutdown_tx.send(true).ok();
    controller_task.await??;

    info!("Pipeline shutdown complete");
    Ok(())
}
