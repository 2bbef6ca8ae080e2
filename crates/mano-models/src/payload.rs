//! Classification payloads.
//!
//! The remote classifier accepts one of two JSON bodies:
//!
//! ```json
//! {"landmarks": [[x1, y1, z1, ..., x21, y21, z21], ...]}
//! {"image": "data:image/jpeg;base64,..."}
//! ```
//!
//! Which one a pipeline sends is fixed by its [`PayloadMode`].

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;
use crate::landmark::LandmarkVector;

/// Representation sent to the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PayloadMode {
    /// Flattened landmark vectors, one per detected hand.
    #[default]
    Landmarks,
    /// The whole frame as an encoded image.
    Image,
}

impl PayloadMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadMode::Landmarks => "landmarks",
            PayloadMode::Image => "image",
        }
    }
}

impl fmt::Display for PayloadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PayloadMode {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "landmarks" | "landmark" => Ok(PayloadMode::Landmarks),
            "image" | "frame" => Ok(PayloadMode::Image),
            other => Err(ModelError::InvalidMode(other.to_string())),
        }
    }
}

/// Body of one classification request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationPayload {
    /// One 63-value vector per hand, in extractor order.
    Landmarks(Vec<LandmarkVector>),
    /// Base64 data URL of the encoded frame.
    Image(String),
}

impl ClassificationPayload {
    pub fn mode(&self) -> PayloadMode {
        match self {
            ClassificationPayload::Landmarks(_) => PayloadMode::Landmarks,
            ClassificationPayload::Image(_) => PayloadMode::Image,
        }
    }

    /// Number of hand vectors carried (zero for image payloads).
    pub fn hand_count(&self) -> usize {
        match self {
            ClassificationPayload::Landmarks(hands) => hands.len(),
            ClassificationPayload::Image(_) => 0,
        }
    }
}
