//! Detection service configuration

use serde::Deserialize;
use std::path::PathBuf;

use crate::engine::{ChannelOrder, DetectParams};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub inference: InferenceConfig,
    pub models: ModelsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Deadline for a single detection request, inference included
    pub request_timeout_secs: u64,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub device: String,
    /// Network input size as (width, height)
    pub input_size: (u32, u32),
    /// Channel order of the network input tensor
    pub channel_order: ChannelOrder,
    /// Run at most one inference at a time
    pub serialize: bool,
    pub threshold: f32,
    pub keep_aspect_ratio: bool,
    pub relative_coord: bool,
    pub top_k: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub model: PathBuf,
    pub labels: PathBuf,
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn default_path() -> &'static str {
        "config.toml"
    }
}

impl InferenceConfig {
    /// Parameters handed to the engine on every request
    pub fn detect_params(&self) -> DetectParams {
        DetectParams {
            threshold: self.threshold,
            keep_aspect_ratio: self.keep_aspect_ratio,
            relative_coord: self.relative_coord,
            top_k: self.top_k,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            request_timeout_secs: 30,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        let params = DetectParams::default();
        Self {
            device: "CPU".to_string(),
            input_size: (300, 300),
            channel_order: ChannelOrder::Bgr,
            serialize: true,
            threshold: params.threshold,
            keep_aspect_ratio: params.keep_aspect_ratio,
            relative_coord: params.relative_coord,
            top_k: params.top_k,
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            model: PathBuf::from("models/ssd_mobilenet_v2_coco.xml"),
            labels: PathBuf::from("models/coco_labels.txt"),
        }
    }
}
