//! Inference engine module
//!
//! Provides OpenVINO-based object detection with:
//! - Model loading once at startup
//! - Letterbox preprocessing and coordinate mapping back to the source image
//! - Serialized access to the native inference call

use std::path::Path;

use image::DynamicImage;
use serde::Serialize;

pub mod detector;
pub mod model;
pub mod preprocess;

pub use detector::OpenVinoDetector;
pub use model::LoadedModel;
pub use preprocess::ChannelOrder;

/// Axis-aligned box given by its two corners
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

/// One scored, localized prediction from the model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub score: f32,
    pub label_id: u32,
    pub bounding_box: BoundingBox,
}

/// Per-call detection parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectParams {
    /// Minimum score for a detection to be kept
    pub threshold: f32,
    /// Letterbox instead of stretching to the network input
    pub keep_aspect_ratio: bool,
    /// Report coordinates in [0, 1] instead of pixels
    pub relative_coord: bool,
    /// Maximum number of ranked detections returned
    pub top_k: usize,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            threshold: 0.05,
            keep_aspect_ratio: true,
            relative_coord: false,
            top_k: 10,
        }
    }
}

/// A loaded detection model
///
/// Implementations run synchronously and may block for the duration of the
/// inference; callers are expected to invoke them off the async executor.
pub trait DetectionEngine: Send + Sync + 'static {
    /// Detect objects in a decoded image
    ///
    /// Results are ranked by descending score and hold at most `params.top_k` entries.
    fn detect_with_image(
        &self,
        image: &DynamicImage,
        params: &DetectParams,
    ) -> anyhow::Result<Vec<Detection>>;

    /// Path of the model file backing this engine
    fn model_path(&self) -> &Path;
}
