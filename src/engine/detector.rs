//! SSD Object Detector
//!
//! Runs single-shot detection models whose output is the OpenVINO
//! `DetectionOutput` layout: `[1, 1, N, 7]` rows of
//! `(image_id, label, confidence, x_min, y_min, x_max, y_max)` with
//! coordinates normalized to the network input.

use std::path::Path;

use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView};
use ndarray::Array4;
use openvino::{ElementType, Shape, Tensor};
use parking_lot::Mutex;
use tracing::info;

use super::model::LoadedModel;
use super::preprocess::{image_to_nchw, letterbox, stretch, ChannelOrder, ResizeInfo};
use super::{BoundingBox, DetectParams, Detection, DetectionEngine};
use crate::config::InferenceConfig;

const DETECTION_ROW_LEN: usize = 7;

/// OpenVINO-backed SSD detector
pub struct OpenVinoDetector {
    model: LoadedModel,
    input_size: (u32, u32),
    channel_order: ChannelOrder,
    // Held for the duration of each inference when serialization is enabled
    infer_gate: Option<Mutex<()>>,
}

impl OpenVinoDetector {
    /// Load the detection model described by the inference config
    pub fn load(config: &InferenceConfig, model_path: &Path) -> Result<Self> {
        let model = LoadedModel::load(model_path, &config.device)?;

        info!(
            "Detector ready on {}: input {}x{} {:?}, serialized: {}",
            model.device(),
            config.input_size.0,
            config.input_size.1,
            config.channel_order,
            config.serialize
        );

        Ok(Self {
            model,
            input_size: config.input_size,
            channel_order: config.channel_order,
            infer_gate: config.serialize.then(|| Mutex::new(())),
        })
    }

    /// Run the network on a preprocessed NCHW tensor and return the raw output rows
    fn infer(&self, input_tensor: &Array4<f32>) -> Result<Vec<f32>> {
        let (width, height) = self.input_size;

        let input_shape = Shape::new(&[1, 3, height as i64, width as i64])?;
        let mut input = Tensor::new(ElementType::F32, &input_shape)?;

        let input_data = input_tensor
            .as_slice()
            .context("input tensor is not contiguous")?;
        unsafe {
            let tensor_data = input.get_raw_data_mut()?.as_mut_ptr() as *mut f32;
            std::ptr::copy_nonoverlapping(input_data.as_ptr(), tensor_data, input_data.len());
        }

        let mut request = self.model.create_infer_request()?;
        request.set_input_tensor(&input)?;

        {
            let _guard = self.infer_gate.as_ref().map(|gate| gate.lock());
            request.infer()?;
        }

        let output = request.get_output_tensor_by_index(0)?;
        read_tensor_f32(&output)
    }
}

impl DetectionEngine for OpenVinoDetector {
    fn detect_with_image(&self, image: &DynamicImage, params: &DetectParams) -> Result<Vec<Detection>> {
        let (orig_w, orig_h) = image.dimensions();
        if orig_w == 0 || orig_h == 0 {
            anyhow::bail!("image has zero size ({}x{})", orig_w, orig_h);
        }

        let (input_image, resize_info) = if params.keep_aspect_ratio {
            letterbox(image, self.input_size)
        } else {
            stretch(image, self.input_size)
        };

        let input_tensor = image_to_nchw(&input_image, self.channel_order);
        let raw = self.infer(&input_tensor)?;

        let detections = postprocess(&raw, &resize_info, params);
        tracing::debug!(
            "{} detections above {} on {}x{} image",
            detections.len(),
            params.threshold,
            orig_w,
            orig_h
        );

        Ok(detections)
    }

    fn model_path(&self) -> &Path {
        self.model.path()
    }
}

/// Read tensor data as f32 vector
fn read_tensor_f32(tensor: &Tensor) -> Result<Vec<f32>> {
    let shape = tensor.get_shape()?;
    let dims: Vec<i64> = shape.get_dimensions().to_vec();
    let total_elements: i64 = dims.iter().product();

    let data: Vec<f32> = unsafe {
        let ptr = tensor.get_raw_data()?.as_ptr() as *const f32;
        std::slice::from_raw_parts(ptr, total_elements as usize).to_vec()
    };

    Ok(data)
}

/// Turn raw `DetectionOutput` rows into ranked detections
///
/// Rows below the threshold or with a negative label are dropped. A row with
/// a negative image id terminates the list. Boxes are mapped back onto the
/// original image, then sorted by descending score (ties keep output order)
/// and truncated to `top_k`.
pub fn postprocess(raw: &[f32], resize_info: &ResizeInfo, params: &DetectParams) -> Vec<Detection> {
    let mut detections = Vec::new();

    for row in raw.chunks_exact(DETECTION_ROW_LEN) {
        let (image_id, label, score) = (row[0], row[1], row[2]);

        if image_id < 0.0 {
            break;
        }
        if label < 0.0 || score.is_nan() || score < params.threshold {
            continue;
        }

        let (x_min, y_min) = resize_info.normalized_to_original(row[3], row[4]);
        let (x_max, y_max) = resize_info.normalized_to_original(row[5], row[6]);

        let bounding_box = if params.relative_coord {
            let (w, h) = (
                resize_info.original_width as f32,
                resize_info.original_height as f32,
            );
            BoundingBox {
                x_min: x_min / w,
                y_min: y_min / h,
                x_max: x_max / w,
                y_max: y_max / h,
            }
        } else {
            BoundingBox { x_min, y_min, x_max, y_max }
        };

        detections.push(Detection {
            score,
            label_id: label as u32,
            bounding_box,
        });
    }

    detections.sort_by(|a, b| b.score.total_cmp(&a.score));
    detections.truncate(params.top_k);
    detections
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(label: f32, score: f32, coords: [f32; 4]) -> [f32; 7] {
        [0.0, label, score, coords[0], coords[1], coords[2], coords[3]]
    }

    fn flatten(rows: &[[f32; 7]]) -> Vec<f32> {
        rows.iter().flat_map(|r| r.iter().copied()).collect()
    }

    fn square_info() -> ResizeInfo {
        ResizeInfo::letterbox((300, 300), (300, 300))
    }

    #[test]
    fn test_threshold_filters_low_scores() {
        let raw = flatten(&[
            row(1.0, 0.9, [0.1, 0.1, 0.2, 0.2]),
            row(2.0, 0.04, [0.1, 0.1, 0.2, 0.2]),
            row(3.0, 0.05, [0.1, 0.1, 0.2, 0.2]),
        ]);
        let detections = postprocess(&raw, &square_info(), &DetectParams::default());

        let labels: Vec<u32> = detections.iter().map(|d| d.label_id).collect();
        assert_eq!(labels, vec![1, 3]);
    }

    #[test]
    fn test_ranked_descending_with_stable_ties() {
        let raw = flatten(&[
            row(1.0, 0.3, [0.0, 0.0, 0.1, 0.1]),
            row(2.0, 0.8, [0.0, 0.0, 0.1, 0.1]),
            row(3.0, 0.3, [0.0, 0.0, 0.1, 0.1]),
            row(4.0, 0.5, [0.0, 0.0, 0.1, 0.1]),
        ]);
        let detections = postprocess(&raw, &square_info(), &DetectParams::default());

        let labels: Vec<u32> = detections.iter().map(|d| d.label_id).collect();
        assert_eq!(labels, vec![2, 4, 1, 3]);
    }

    #[test]
    fn test_top_k_cap() {
        let rows: Vec<[f32; 7]> = (0..25)
            .map(|i| row(i as f32, 0.1 + i as f32 * 0.01, [0.0, 0.0, 0.5, 0.5]))
            .collect();
        let detections = postprocess(&flatten(&rows), &square_info(), &DetectParams::default());

        assert_eq!(detections.len(), 10);
        assert_eq!(detections[0].label_id, 24);
        assert_eq!(detections[9].label_id, 15);
    }

    #[test]
    fn test_negative_image_id_terminates() {
        let mut raw = flatten(&[row(1.0, 0.9, [0.1, 0.1, 0.2, 0.2])]);
        raw.extend_from_slice(&[-1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        raw.extend_from_slice(&row(2.0, 0.95, [0.1, 0.1, 0.2, 0.2]));

        let detections = postprocess(&raw, &square_info(), &DetectParams::default());
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].label_id, 1);
    }

    #[test]
    fn test_letterbox_padding_removed() {
        // 600x300 image letterboxed into 300x300: content spans y in [75, 225]
        let info = ResizeInfo::letterbox((600, 300), (300, 300));
        let raw = flatten(&[row(0.0, 0.9, [0.25, 0.25, 0.75, 0.75])]);

        let detections = postprocess(&raw, &info, &DetectParams::default());
        let bbox = detections[0].bounding_box;
        assert!((bbox.x_min - 150.0).abs() < 1e-3);
        assert!((bbox.y_min - 0.0).abs() < 1e-3);
        assert!((bbox.x_max - 450.0).abs() < 1e-3);
        assert!((bbox.y_max - 300.0).abs() < 1e-3);
    }

    #[test]
    fn test_relative_coordinates() {
        let info = ResizeInfo::stretch((640, 480), (300, 300));
        let params = DetectParams {
            relative_coord: true,
            keep_aspect_ratio: false,
            ..DetectParams::default()
        };
        let raw = flatten(&[row(0.0, 0.9, [0.25, 0.5, 0.75, 1.0])]);

        let bbox = postprocess(&raw, &info, &params)[0].bounding_box;
        assert!((bbox.x_min - 0.25).abs() < 1e-5);
        assert!((bbox.y_min - 0.5).abs() < 1e-5);
        assert!((bbox.x_max - 0.75).abs() < 1e-5);
        assert!((bbox.y_max - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_trailing_partial_row_ignored() {
        let mut raw = flatten(&[row(5.0, 0.7, [0.1, 0.1, 0.2, 0.2])]);
        raw.extend_from_slice(&[0.0, 1.0, 0.9]);

        let detections = postprocess(&raw, &square_info(), &DetectParams::default());
        assert_eq!(detections.len(), 1);
    }
}
