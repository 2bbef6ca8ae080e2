//! Classification service HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use mano_models::{ClassificationPayload, PredictedSign};

use crate::error::{MlError, MlResult};
use crate::types::{HealthResponse, PredictResponse};

/// Configuration for the inference client.
#[derive(Debug, Clone)]
pub struct InferenceClientConfig {
    /// Base URL of the classification service
    pub base_url: String,
    /// Path of the prediction endpoint
    pub predict_path: String,
    /// Whole-request timeout
    pub timeout: Duration,
    /// Connection establishment timeout
    pub connect_timeout: Duration,
}

impl Default for InferenceClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            predict_path: "/predict".to_string(),
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(3),
        }
    }
}

impl InferenceClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("ML_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:5000".to_string()),
            predict_path: std::env::var("ML_SERVICE_PREDICT_PATH")
                .unwrap_or_else(|_| "/predict".to_string()),
            timeout: Duration::from_millis(
                std::env::var("ML_SERVICE_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10_000),
            ),
            connect_timeout: Duration::from_millis(
                std::env::var("ML_SERVICE_CONNECT_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3_000),
            ),
        }
    }

    fn predict_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.predict_path.trim_start_matches('/')
        )
    }

    fn health_url(&self) -> String {
        format!("{}/health", self.base_url.trim_end_matches('/'))
    }
}

/// Anything that can turn a payload into a predicted sign.
///
/// The pipeline depends on this trait rather than on the HTTP client so the
/// dispatch logic can be exercised without a network.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, payload: &ClassificationPayload) -> MlResult<PredictedSign>;
}

/// Client for the remote classification service.
pub struct InferenceClient {
    http: Client,
    config: InferenceClientConfig,
}

impl InferenceClient {
    /// Create a new inference client.
    pub fn new(config: InferenceClientConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(MlError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> MlResult<Self> {
        Self::new(InferenceClientConfig::from_env())
    }

    pub fn config(&self) -> &InferenceClientConfig {
        &self.config
    }

    /// Check if the classification service is healthy.
    pub async fn health_check(&self) -> MlResult<bool> {
        let url = self.config.health_url();

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<HealthResponse>().await {
                    Ok(health) => Ok(health.status == "healthy" || health.status == "ok"),
                    Err(e) => {
                        warn!("Classification service health response unreadable: {}", e);
                        Ok(false)
                    }
                }
            }
            Ok(response) => {
                warn!("Classification service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Classification service health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// Send one payload and parse the predicted sign.
    ///
    /// Exactly one request is made; failures are returned, not retried.
    pub async fn predict(&self, payload: &ClassificationPayload) -> MlResult<PredictedSign> {
        let url = self.config.predict_url();

        debug!(
            mode = %payload.mode(),
            hands = payload.hand_count(),
            "Sending classification request to {}",
            url
        );

        let response = self
            .http
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(MlError::ServiceStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: PredictResponse = serde_json::from_str(&body)?;
        parsed.into_sign()
    }

    fn transport_error(&self, error: reqwest::Error) -> MlError {
        if error.is_timeout() {
            MlError::Timeout(self.config.timeout.as_millis() as u64)
        } else {
            MlError::Network(error)
        }
    }
}

#[async_trait]
impl Classifier for InferenceClient {
    async fn classify(&self, payload: &ClassificationPayload) -> MlResult<PredictedSign> {
        self.predict(payload).await
    }
}
