mod utils;
pub mod aggregation;
pub mod common;
pub mod data;
pub mod inference_runners;
pub mod pipeline;
pub mod report;
pub mod visualize;

use std::sync::OnceLock;
use std::time::Instant;
use anyhow::Result;
use crate::common::RunConfig;
use crate::data::{open_source, ConfigOrt, TenCrop};
use crate::inference_runners::{init_runtime, DataParallel, InferenceModel, OrtEngine};
use crate::pipeline::Pipeline;
use crate::report::Report;
use crate::visualize::SaliencyVisualizer;

static RUNTIME: OnceLock<Result<(), String>> = OnceLock::new();

/// Runs `init` the first time only. Every later call reports the first outcome.
fn init_once(cell: &OnceLock<Result<(), String>>, init: impl FnOnce() -> Result<()>) -> Result<()> {
    cell.get_or_init(|| init().map_err(|e| format!("{e:#}")))
        .clone()
        .map_err(anyhow::Error::msg)
}

/// Loads the checkpoint on every configured device. One device gives a plain
/// session, several give a data-parallel wrapper.
pub fn init_classifier(config: &ConfigOrt) -> Result<Box<dyn InferenceModel>> {
    init_once(&RUNTIME, || init_runtime(config.ort_lib_path.as_deref()))?;

    let now = Instant::now();
    let model: Box<dyn InferenceModel> = match config.devices().as_slice() {
        [device] => Box::new(OrtEngine::new(config, *device)?),
        _ => Box::new(DataParallel::from_config(config)?),
    };
    log::info!("Loaded {} from {} in {:.2?}", model.describe(), config.onnx_path, now.elapsed());
    Ok(model)
}

/// Validates `run`, loads the model and runs the whole pipeline.
pub fn run_inference(
    run: RunConfig,
    ort: &ConfigOrt,
    visualizer: Option<Box<dyn SaliencyVisualizer>>,
) -> Result<Report> {
    run.validate()?;
    log::debug!("{run}");

    let source = open_source(&run.source, TenCrop::default())?;
    let model = init_classifier(ort)?;

    let mut pipeline = Pipeline::new(run, model, source).with_class_names(ort.names.clone());
    if let Some(visualizer) = visualizer {
        pipeline = pipeline.with_visualizer(visualizer);
    }
    pipeline.run()
}
