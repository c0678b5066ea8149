//! Batched ten-crop inference of a chest X-ray classifier.
//!
//! ```text
//! cxr_infer --img_dir data/test --visualize_dir out [--combine_pneumonia] [--binary_eval]
//! ```

use std::path::PathBuf;
use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use simple_logger::SimpleLogger;
use cxr_classify::common::{InferenceDevice, RunConfig, SourceKind};
use cxr_classify::data::ConfigOrt;
use cxr_classify::visualize::{CommandVisualizer, SaliencyVisualizer};

#[derive(Parser, Debug)]
#[command(name = "cxr_infer")]
#[command(about = "Classify chest X-rays and write per-image class probabilities to preds.txt")]
struct Args {
    /// Directory searched recursively for .jpg images
    #[arg(long = "img_dir")]
    img_dir: PathBuf,

    /// ONNX export of the trained classifier
    #[arg(long, default_value = "models/Global_Best.onnx")]
    checkpoint: PathBuf,

    /// Model merges bacterial and viral pneumonia into one class
    #[arg(long = "combine_pneumonia")]
    combine_pneumonia: bool,

    /// Output directory for preds.txt and saliency maps
    #[arg(long = "visualize_dir")]
    visualize_dir: Option<PathBuf>,

    /// Report covid against non-covid only
    #[arg(long = "binary_eval")]
    binary_eval: bool,

    /// Read image names from a list file, resolved against --img_dir
    #[arg(long = "image_list")]
    image_list: Option<PathBuf>,

    #[arg(long = "batch_size", default_value_t = 64)]
    batch_size: usize,

    /// Image decoding threads
    #[arg(long = "num_workers", default_value_t = 8)]
    num_workers: usize,

    /// cpu, cuda, tensorrt or coreml; accelerators fall back to cpu
    #[arg(long, default_value = "cuda")]
    device: String,

    /// Accelerator ids; more than one splits each batch across them
    #[arg(long = "device_ids", value_delimiter = ',', default_value = "0")]
    device_ids: Vec<usize>,

    /// onnxruntime shared library to load
    #[arg(long = "ort_lib")]
    ort_lib: Option<String>,

    /// JSON file with engine options, overridden by the flags above
    #[arg(long = "ort_config")]
    ort_config: Option<PathBuf>,

    /// Saliency program run after the report, e.g. "python3 tools/visualize.py"
    #[arg(long)]
    visualizer: Option<String>,

    /// Also print the results as a table
    #[arg(long)]
    table: bool,

    /// Log per-stage timings
    #[arg(long)]
    profile: bool,

    #[arg(long = "log_level", default_value = "info")]
    log_level: LevelFilter,
}

impl Args {
    fn run_config(&self) -> RunConfig {
        let source = match &self.image_list {
            Some(list) => SourceKind::List { list_file: list.clone(), root: self.img_dir.clone() },
            None => SourceKind::Directory(self.img_dir.clone()),
        };
        RunConfig::new(&self.img_dir)
            .with_source(source)
            .with_checkpoint(&self.checkpoint)
            .with_output_dir(self.visualize_dir.as_ref())
            .with_combine_pneumonia(self.combine_pneumonia)
            .with_binary_eval(self.binary_eval)
            .with_batch_size(self.batch_size)
            .with_num_workers(self.num_workers)
            .with_print_table(self.table)
            .with_profile(self.profile)
    }

    fn ort_config(&self) -> Result<ConfigOrt> {
        let config = match &self.ort_config {
            Some(path) => ConfigOrt::from_json_file(path)?,
            None => ConfigOrt::new(),
        };
        let first_id = self.device_ids.first().copied().unwrap_or(0);
        let device = InferenceDevice::from_str(&self.device, first_id)
            .with_context(|| format!(
                "Unknown device {}, expected one of {:?}",
                self.device,
                InferenceDevice::all_inference_devices()
            ))?;
        let mut config = config
            .with_model(&self.checkpoint.to_string_lossy())
            .with_device(device)
            .with_device_ids(&self.device_ids)
            .with_profile(self.profile);
        if self.ort_lib.is_some() {
            config = config.with_ort_lib_path(self.ort_lib.as_deref());
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    SimpleLogger::new().with_level(args.log_level).init()?;

    let run = args.run_config();
    let ort = args.ort_config()?;
    let visualizer = match &args.visualizer {
        Some(line) => Some(Box::new(CommandVisualizer::from_command_line(line)?) as Box<dyn SaliencyVisualizer>),
        None => None,
    };

    let report = cxr_classify::run_inference(run, &ort, visualizer)?;
    log::info!("{} predictions written", report.len());
    Ok(())
}
