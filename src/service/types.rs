//! Service layer types

use serde::{Deserialize, Serialize};

/// Detection response body
///
/// `predictions` is only present when at least one object was detected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predictions: Option<Vec<Prediction>>,
}

impl PredictionResponse {
    /// Response for a missing image or an empty detection result
    pub fn failure() -> Self {
        Self {
            success: false,
            predictions: None,
        }
    }

    pub fn with_predictions(predictions: Vec<Prediction>) -> Self {
        Self {
            success: true,
            predictions: Some(predictions),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub confidence: f32,
    pub label: String,
    pub x_min: i32,
    pub y_min: i32,
    pub x_max: i32,
    pub y_max: i32,
}

/// Health check result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResult {
    pub healthy: bool,
    pub version: String,
    pub model: String,
    pub labels: usize,
}
