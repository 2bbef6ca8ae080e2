//! Classification service response types.

use serde::{Deserialize, Serialize};

use mano_models::PredictedSign;

use crate::error::{MlError, MlResult};

/// Body of a `/predict` response.
///
/// The service answers either `{"signs": [...]}` (one label per hand) or
/// `{"sign": "..."}`. Anything else is an invalid response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign: Option<String>,
}

impl PredictResponse {
    /// Convert to a prediction. `signs` takes precedence when both are set.
    pub fn into_sign(self) -> MlResult<PredictedSign> {
        if let Some(signs) = self.signs {
            return PredictedSign::new(signs)
                .map_err(|_| MlError::invalid_response("response has an empty `signs` list"));
        }
        match self.sign {
            Some(sign) => Ok(PredictedSign::single(sign)),
            None => Err(MlError::invalid_response(
                "response has neither `signs` nor `sign`",
            )),
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: Option<String>,
}
