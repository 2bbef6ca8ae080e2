//! Camera session state and device selection.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Lifecycle of a camera session.
///
/// `Idle -> Starting -> Active -> Stopping -> Idle`. A device switch runs
/// `Active -> Stopping -> Starting -> Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Starting,
    Active,
    Stopping,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::Active => "active",
            SessionState::Stopping => "stopping",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which capture device to open.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeviceSelector {
    /// User-facing camera (`"user"` facing mode)
    #[default]
    Front,
    /// World-facing camera (`"environment"` facing mode)
    Back,
    /// Device by enumeration index
    Index(u32),
    /// Device by path or platform identifier
    Path(String),
}

impl DeviceSelector {
    /// Camera on the other side of the device. Explicit indices and paths
    /// flip to the front camera.
    pub fn toggled(&self) -> Self {
        match self {
            DeviceSelector::Front => DeviceSelector::Back,
            _ => DeviceSelector::Front,
        }
    }

    /// Facing mode string, for selectors that have one.
    pub fn facing_mode(&self) -> Option<&'static str> {
        match self {
            DeviceSelector::Front => Some("user"),
            DeviceSelector::Back => Some("environment"),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelector::Front => write!(f, "user"),
            DeviceSelector::Back => write!(f, "environment"),
            DeviceSelector::Index(i) => write!(f, "{}", i),
            DeviceSelector::Path(p) => write!(f, "{}", p),
        }
    }
}

impl FromStr for DeviceSelector {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s.to_lowercase().as_str() {
            "user" | "front" => DeviceSelector::Front,
            "environment" | "back" | "rear" => DeviceSelector::Back,
            _ => match s.parse::<u32>() {
                Ok(index) => DeviceSelector::Index(index),
                Err(_) => DeviceSelector::Path(s.to_string()),
            },
        })
    }
}
