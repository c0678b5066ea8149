mod crop_classifier;
mod data_parallel;
mod ort_engine;
pub mod image_ops;
pub mod input_wrapper;
pub mod xs;

pub use crop_classifier::*;
pub use data_parallel::*;
pub use ort_engine::*;
