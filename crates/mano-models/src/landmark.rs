//! Hand landmarks.
//!
//! A detected hand is described by 21 normalized 3D points in the order the
//! extraction engine reports them:
//!
//! - 0: Wrist
//! - 1-4: Thumb (CMC, MCP, IP, tip)
//! - 5-8: Index finger (MCP, PIP, DIP, tip)
//! - 9-12: Middle finger
//! - 13-16: Ring finger
//! - 17-20: Pinky
//!
//! The remote classifier consumes each hand as a flat vector
//! `[x1, y1, z1, ..., x21, y21, z21]`.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Number of landmarks in one hand record.
pub const LANDMARKS_PER_HAND: usize = 21;

/// Number of floats in one flattened hand vector.
pub const VALUES_PER_HAND: usize = LANDMARKS_PER_HAND * 3;

/// One normalized landmark. `x` and `y` are roughly in [0, 1]; `z` is a
/// relative depth and may fall outside that range.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl From<[f32; 3]> for Landmark {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self { x, y, z }
    }
}

/// One detected hand with exactly [`LANDMARKS_PER_HAND`] points.
///
/// The point count is checked on construction and the record is immutable
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandRecord {
    landmarks: Vec<Landmark>,
}

impl HandRecord {
    /// Create a hand record, rejecting any landmark count other than 21.
    pub fn new(landmarks: Vec<Landmark>) -> ModelResult<Self> {
        if landmarks.len() != LANDMARKS_PER_HAND {
            return Err(ModelError::LandmarkCount {
                expected: LANDMARKS_PER_HAND,
                actual: landmarks.len(),
            });
        }
        Ok(Self { landmarks })
    }

    /// Landmarks in detection order.
    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }

    /// Flatten to the 63-value wire vector, preserving point order.
    pub fn flatten(&self) -> LandmarkVector {
        let values = self
            .landmarks
            .iter()
            .flat_map(|p| [p.x, p.y, p.z])
            .collect();
        LandmarkVector(values)
    }
}

impl<'de> Deserialize<'de> for HandRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            landmarks: Vec<Landmark>,
        }

        let raw = Raw::deserialize(deserializer)?;
        HandRecord::new(raw.landmarks).map_err(serde::de::Error::custom)
    }
}

/// Flattened hand vector of exactly [`VALUES_PER_HAND`] floats.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LandmarkVector(Vec<f32>);

impl LandmarkVector {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<f32>> for LandmarkVector {
    type Error = ModelError;

    fn try_from(values: Vec<f32>) -> ModelResult<Self> {
        if values.len() != VALUES_PER_HAND {
            return Err(ModelError::VectorLength {
                expected: VALUES_PER_HAND,
                actual: values.len(),
            });
        }
        Ok(Self(values))
    }
}
