//! REST API response data transfer objects

use serde::{Deserialize, Serialize};

use crate::service::ServiceError;

pub use crate::service::{Prediction, PredictionResponse};

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: String,
    pub model: String,
    pub labels: usize,
    pub uptime_seconds: u64,
}

/// Error response for requests that could not be processed
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: &str, code: &str) -> Self {
        Self {
            success: false,
            error: error.to_string(),
            code: code.to_string(),
        }
    }
}

impl From<&ServiceError> for ErrorResponse {
    fn from(err: &ServiceError) -> Self {
        Self::new(&err.to_string(), err.code())
    }
}
