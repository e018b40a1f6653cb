//! Detection request failures

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("label id {0} not found in label table")]
    UnknownLabel(u32),

    #[error("inference failed: {0:#}")]
    Inference(anyhow::Error),

    #[error("inference did not finish within {0:?}")]
    Timeout(Duration),

    #[error("inference task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ServiceError {
    /// Stable machine-readable code reported to clients
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Decode(_) => "DECODE_FAILED",
            ServiceError::UnknownLabel(_) => "UNKNOWN_LABEL",
            ServiceError::Inference(_) | ServiceError::Join(_) => "INFERENCE_FAILED",
            ServiceError::Timeout(_) => "INFERENCE_TIMEOUT",
        }
    }
}
