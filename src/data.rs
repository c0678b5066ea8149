mod batch_loader;
mod config_ort;
mod image_source;
mod time_calc;

pub use batch_loader::{BatchLoader, Batches};
pub use config_ort::ConfigOrt;
pub use image_source::*;
pub use time_calc::TimeCalc;

pub use crate::inference_runners::ort_classifier::image_ops::{TenCrop, N_CROPS};
pub use crate::inference_runners::ort_classifier::input_wrapper::X;
pub use crate::inference_runners::ort_classifier::xs::Xs;

pub(crate) const CROSS_MARK: &str = "❌";
