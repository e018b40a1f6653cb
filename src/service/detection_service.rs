//! Detection Service - Core request handling
//!
//! Decodes an uploaded image, runs the detection engine and translates the
//! raw detections into the public response schema.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::engine::preprocess::decode_image;
use crate::engine::{DetectParams, Detection, DetectionEngine};
use crate::labels::LabelTable;

use super::error::ServiceError;
use super::types::*;

/// Immutable per-process detection context shared by all requests
pub struct DetectionService {
    engine: Arc<dyn DetectionEngine>,
    labels: LabelTable,
    params: DetectParams,
    timeout: Duration,
}

impl DetectionService {
    pub fn new(
        engine: Arc<dyn DetectionEngine>,
        labels: LabelTable,
        params: DetectParams,
        timeout: Duration,
    ) -> Self {
        Self {
            engine,
            labels,
            params,
            timeout,
        }
    }

    pub fn model_path(&self) -> &Path {
        self.engine.model_path()
    }

    /// Run detection on raw upload bytes
    ///
    /// Decoding and inference run on the blocking pool under the configured
    /// deadline. An empty detection result yields `success: false`.
    pub async fn predict(&self, image_data: Vec<u8>) -> Result<PredictionResponse, ServiceError> {
        let start = Instant::now();

        let engine = self.engine.clone();
        let params = self.params;
        let task = tokio::task::spawn_blocking(move || -> Result<Vec<Detection>, ServiceError> {
            let image = decode_image(&image_data)?;
            debug!("Decoded image {}x{}", image.width(), image.height());
            engine
                .detect_with_image(&image, &params)
                .map_err(ServiceError::Inference)
        });

        let detections = tokio::time::timeout(self.timeout, task)
            .await
            .map_err(|_| ServiceError::Timeout(self.timeout))???;

        let response = self.build_response(&detections)?;

        info!(
            "Detected {} objects in {}ms",
            detections.len(),
            start.elapsed().as_millis()
        );

        Ok(response)
    }

    /// Map engine detections onto the response schema, preserving their order
    pub fn build_response(&self, detections: &[Detection]) -> Result<PredictionResponse, ServiceError> {
        if detections.is_empty() {
            return Ok(PredictionResponse::failure());
        }

        let predictions = detections
            .iter()
            .map(|d| self.to_prediction(d))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PredictionResponse::with_predictions(predictions))
    }

    fn to_prediction(&self, detection: &Detection) -> Result<Prediction, ServiceError> {
        let label = self
            .labels
            .get(detection.label_id)
            .ok_or(ServiceError::UnknownLabel(detection.label_id))?;

        // `as` truncates toward zero
        let bbox = &detection.bounding_box;
        Ok(Prediction {
            confidence: detection.score,
            label: label.to_string(),
            x_min: bbox.x_min as i32,
            y_min: bbox.y_min as i32,
            x_max: bbox.x_max as i32,
            y_max: bbox.y_max as i32,
        })
    }

    /// Health check
    pub fn health(&self) -> HealthResult {
        HealthResult {
            healthy: true,
            version: env!("CARGO_PKG_VERSION").to_string(),
            model: self.model_path().display().to_string(),
            labels: self.labels.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BoundingBox;
    use image::{DynamicImage, ImageBuffer, Rgb};
    use std::path::PathBuf;

    struct FixedEngine {
        detections: Vec<Detection>,
        path: PathBuf,
        delay: Option<Duration>,
    }

    impl FixedEngine {
        fn new(detections: Vec<Detection>) -> Self {
            Self {
                detections,
                path: PathBuf::from("models/test.xml"),
                delay: None,
            }
        }
    }

    impl DetectionEngine for FixedEngine {
        fn detect_with_image(
            &self,
            _image: &DynamicImage,
            params: &DetectParams,
        ) -> anyhow::Result<Vec<Detection>> {
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            Ok(self.detections.iter().take(params.top_k).cloned().collect())
        }

        fn model_path(&self) -> &Path {
            &self.path
        }
    }

    fn detection(label_id: u32, score: f32, coords: [f32; 4]) -> Detection {
        Detection {
            score,
            label_id,
            bounding_box: BoundingBox {
                x_min: coords[0],
                y_min: coords[1],
                x_max: coords[2],
                y_max: coords[3],
            },
        }
    }

    fn labels() -> LabelTable {
        LabelTable::parse("0 person\n2 car\n17 dog\n").unwrap()
    }

    fn service(engine: FixedEngine) -> DetectionService {
        DetectionService::new(
            Arc::new(engine),
            labels(),
            DetectParams::default(),
            Duration::from_secs(5),
        )
    }

    fn png_bytes() -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(16, 12, Rgb([10u8, 20, 30])));
        let mut buffer = std::io::Cursor::new(Vec::new());
        image.write_to(&mut buffer, image::ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_empty_detections_is_failure() {
        let service = service(FixedEngine::new(vec![]));
        let response = service.build_response(&[]).unwrap();
        assert_eq!(response, PredictionResponse::failure());
    }

    #[test]
    fn test_coordinates_truncated_not_rounded() {
        let service = service(FixedEngine::new(vec![]));
        let response = service
            .build_response(&[detection(17, 0.75, [10.9, 20.5, 99.99, 0.4])])
            .unwrap();

        let prediction = &response.predictions.unwrap()[0];
        assert_eq!(prediction.label, "dog");
        assert_eq!(prediction.x_min, 10);
        assert_eq!(prediction.y_min, 20);
        assert_eq!(prediction.x_max, 99);
        assert_eq!(prediction.y_max, 0);
    }

    #[test]
    fn test_order_preserved() {
        let service = service(FixedEngine::new(vec![]));
        let response = service
            .build_response(&[
                detection(2, 0.4, [0.0, 0.0, 1.0, 1.0]),
                detection(0, 0.9, [0.0, 0.0, 1.0, 1.0]),
            ])
            .unwrap();

        let labels: Vec<String> = response
            .predictions
            .unwrap()
            .into_iter()
            .map(|p| p.label)
            .collect();
        assert_eq!(labels, vec!["car", "person"]);
    }

    #[test]
    fn test_unknown_label_is_error() {
        let service = service(FixedEngine::new(vec![]));
        let err = service
            .build_response(&[
                detection(0, 0.9, [0.0, 0.0, 1.0, 1.0]),
                detection(42, 0.8, [0.0, 0.0, 1.0, 1.0]),
            ])
            .unwrap_err();

        assert!(matches!(err, ServiceError::UnknownLabel(42)));
        assert_eq!(err.code(), "UNKNOWN_LABEL");
    }

    #[tokio::test]
    async fn test_predict_end_to_end() {
        let service = service(FixedEngine::new(vec![
            detection(0, 0.9, [1.2, 2.7, 8.9, 11.1]),
            detection(2, 0.6, [0.0, 0.0, 4.0, 4.0]),
        ]));

        let response = service.predict(png_bytes()).await.unwrap();
        assert!(response.success);
        let predictions = response.predictions.unwrap();
        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0].label, "person");
        assert_eq!(predictions[0].x_min, 1);
        assert_eq!(predictions[0].y_max, 11);
    }

    #[tokio::test]
    async fn test_predict_caps_at_top_k() {
        let many = (0..15).map(|_| detection(0, 0.5, [0.0, 0.0, 1.0, 1.0])).collect();
        let service = service(FixedEngine::new(many));

        let response = service.predict(png_bytes()).await.unwrap();
        assert_eq!(response.predictions.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_predict_rejects_undecodable_bytes() {
        let service = service(FixedEngine::new(vec![detection(0, 0.9, [0.0, 0.0, 1.0, 1.0])]));

        let err = service.predict(b"not an image".to_vec()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Decode(_)));
        assert_eq!(err.code(), "DECODE_FAILED");
    }

    #[tokio::test]
    async fn test_predict_times_out() {
        let mut engine = FixedEngine::new(vec![detection(0, 0.9, [0.0, 0.0, 1.0, 1.0])]);
        engine.delay = Some(Duration::from_millis(500));
        let service = DetectionService::new(
            Arc::new(engine),
            labels(),
            DetectParams::default(),
            Duration::from_millis(50),
        );

        let err = service.predict(png_bytes()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Timeout(_)));
    }

    #[test]
    fn test_health_reports_model_and_labels() {
        let health = service(FixedEngine::new(vec![])).health();
        assert!(health.healthy);
        assert_eq!(health.model, "models/test.xml");
        assert_eq!(health.labels, 3);
    }
}
