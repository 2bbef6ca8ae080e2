//! Predicted signs and the observable prediction state.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ModelError, ModelResult};

/// Separator used when a response carries several labels.
pub const SIGN_SEPARATOR: &str = " / ";

/// One or more symbol labels, in the order the classifier returned them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictedSign {
    labels: Vec<String>,
}

impl PredictedSign {
    /// Create a prediction from the service's labels. Order is kept as given.
    pub fn new(labels: Vec<String>) -> ModelResult<Self> {
        if labels.is_empty() {
            return Err(ModelError::EmptySign);
        }
        Ok(Self { labels })
    }

    pub fn single(label: impl Into<String>) -> Self {
        Self {
            labels: vec![label.into()],
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl fmt::Display for PredictedSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.labels.join(SIGN_SEPARATOR))
    }
}

/// Latest known-good prediction exposed to observers.
///
/// Only successful classifications update it; failures leave the previous
/// value in place.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct PredictionState {
    /// Display text of the current sign, if any prediction has arrived
    pub current_sign: Option<String>,
    /// When `current_sign` was last replaced
    pub last_updated: Option<DateTime<Utc>>,
}

impl PredictionState {
    /// State after a successful classification at `at`.
    pub fn updated(sign: &PredictedSign, at: DateTime<Utc>) -> Self {
        Self {
            current_sign: Some(sign.to_string()),
            last_updated: Some(at),
        }
    }

    pub fn has_sign(&self) -> bool {
        self.current_sign.is_some()
    }
}
