//! Options for building ONNX Runtime sessions.

use std::path::Path;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use crate::common::InferenceDevice;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOrt {
    pub onnx_path: String,
    pub ort_lib_path: Option<String>,
    pub device: InferenceDevice,
    /// One session per id; more than one splits every batch across them.
    pub device_ids: Vec<usize>,
    pub crop_width: u32,
    pub crop_height: u32,
    pub intra_threads: Option<usize>,
    pub profile: bool,
    pub num_dry_run: usize,

    // trt related
    pub trt_engine_cache_enable: bool,
    pub trt_fp16_enable: bool,

    /// Class names of the model outputs, preferred over the model's metadata.
    pub names: Option<Vec<String>>,
}

impl Default for ConfigOrt {
    fn default() -> Self {
        Self {
            onnx_path: String::new(),
            ort_lib_path: None,
            device: InferenceDevice::CUDA(0),
            device_ids: vec![0],
            crop_width: 224,
            crop_height: 224,
            intra_threads: None,
            profile: false,
            num_dry_run: 0,

            trt_engine_cache_enable: true,
            trt_fp16_enable: false,

            names: None,
        }
    }
}

impl ConfigOrt {
    pub fn new() -> Self {
        Default::default()
    }

    /// Reads engine options from a JSON file; missing keys keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open ORT config {}", path.display()))?;
        serde_json::from_reader(std::io::BufReader::new(file))
            .with_context(|| format!("Failed to parse ORT config {}", path.display()))
    }

    pub fn with_model(mut self, onnx_path: &str) -> Self {
        self.onnx_path = onnx_path.to_string();
        self
    }

    pub fn with_ort_lib_path(mut self, ort_lib_path: Option<&str>) -> Self {
        self.ort_lib_path = ort_lib_path.map(|x| x.to_string());
        self
    }

    pub fn with_device(mut self, device_type: InferenceDevice) -> Self {
        self.device = device_type;
        self
    }

    pub fn with_device_ids(mut self, ids: &[usize]) -> Self {
        self.device_ids = ids.to_vec();
        self
    }

    pub fn with_profile(mut self, profile: bool) -> Self {
        self.profile = profile;
        self
    }

    /// Devices the model gets replicated on, in split order.
    pub fn devices(&self) -> Vec<InferenceDevice> {
        if !self.device.is_accelerator() || self.device_ids.is_empty() {
            return vec![self.device];
        }
        self.device_ids.iter().map(|&id| self.device.with_id(id)).collect()
    }
}
