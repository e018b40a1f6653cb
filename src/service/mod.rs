//! Service layer module

pub mod detection_service;
pub mod error;
pub mod types;

pub use detection_service::DetectionService;
pub use error::ServiceError;
pub use types::*;
