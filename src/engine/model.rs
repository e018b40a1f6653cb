//! Compiled model handle
//!
//! Loads the model once at startup and hands out inference requests.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use openvino::{CompiledModel, Core, InferRequest};
use parking_lot::Mutex;
use tracing::info;

/// Keeps the OpenVINO runtime alive; never touched after construction
struct SafeCore(#[allow(dead_code)] Core);
unsafe impl Send for SafeCore {}
unsafe impl Sync for SafeCore {}

/// Wrapper for OpenVINO CompiledModel that can move between threads
///
/// Only ever accessed behind the mutex in [`LoadedModel`].
struct SafeCompiledModel(CompiledModel);
unsafe impl Send for SafeCompiledModel {}

/// A model compiled for one device, shared read-only across requests
pub struct LoadedModel {
    // Keeps the runtime alive for as long as the compiled model exists
    _core: SafeCore,
    compiled: Mutex<SafeCompiledModel>,
    path: PathBuf,
    device: String,
}

impl LoadedModel {
    /// Read and compile a model file (OpenVINO IR or ONNX)
    pub fn load(path: &Path, device: &str) -> Result<Self> {
        let path_str = path
            .to_str()
            .with_context(|| format!("model path is not valid UTF-8: {:?}", path))?;

        if !path.exists() {
            anyhow::bail!("model file not found: {}", path.display());
        }

        info!("Loading model from {} on {}", path.display(), device);
        let start = Instant::now();

        let mut core = Core::new()?;
        let model = core
            .read_model_from_file(path_str, "")
            .with_context(|| format!("failed to read model {}", path.display()))?;
        let compiled = core
            .compile_model(&model, device.into())
            .with_context(|| format!("failed to compile model for device {}", device))?;

        info!("Model loaded in {:?}", start.elapsed());

        Ok(Self {
            _core: SafeCore(core),
            compiled: Mutex::new(SafeCompiledModel(compiled)),
            path: path.to_path_buf(),
            device: device.to_string(),
        })
    }

    /// Create an inference request
    ///
    /// The Rust bindings require `&mut CompiledModel`, so creation is serialized.
    pub fn create_infer_request(&self) -> Result<InferRequest> {
        let mut compiled = self.compiled.lock();
        Ok(compiled.0.create_infer_request()?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn device(&self) -> &str {
        &self.device
    }
}
