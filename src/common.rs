mod class_layout;
mod inference_device;
mod run_config;
mod xray_sample;

pub use class_layout::*;
pub use inference_device::*;
pub use run_config::*;
pub use xray_sample::*;
