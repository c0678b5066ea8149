//! End to end run: load batches, classify, aggregate, report, visualize.

use std::sync::Arc;
use std::time::Instant;
use anyhow::{Context, Result};
use crate::aggregation::PredictionTable;
use crate::common::{ClassLayout, RunConfig};
use crate::data::{BatchLoader, ImageSource, CROSS_MARK};
use crate::inference_runners::{CropClassifier, InferenceModel, InferenceProcess};
use crate::report::Report;
use crate::utils;
use crate::visualize::{SaliencyVisualizer, VisualizeRequest};

pub struct Pipeline<M: InferenceModel> {
    config: RunConfig,
    classifier: CropClassifier<M>,
    source: Arc<dyn ImageSource>,
    visualizer: Option<Box<dyn SaliencyVisualizer>>,
    class_names: Option<Vec<String>>,
}

impl<M: InferenceModel> Pipeline<M> {
    pub fn new(config: RunConfig, model: M, source: Arc<dyn ImageSource>) -> Self {
        Self {
            config,
            classifier: CropClassifier::new(model),
            source,
            visualizer: None,
            class_names: None,
        }
    }

    /// Names of the model's output classes, used instead of its metadata.
    pub fn with_class_names(mut self, names: Option<Vec<String>>) -> Self {
        self.class_names = names;
        self
    }

    pub fn with_visualizer(mut self, visualizer: Box<dyn SaliencyVisualizer>) -> Self {
        self.visualizer = Some(visualizer);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn model(&self) -> &M {
        self.classifier.model()
    }

    /// Raw crop-averaged predictions for every image, in source order.
    pub fn predict(&mut self) -> Result<PredictionTable> {
        let loader = BatchLoader::new(Arc::clone(&self.source), self.config.batch_size)
            .with_num_workers(self.config.num_workers)
            .with_prefetch(self.config.prefetch);
        let n_batches = loader.len();
        let profile = self.config.profile;

        let mut table = PredictionTable::new();
        let start = Instant::now();
        for (i, batch) in loader.iter()?.enumerate() {
            let batch = batch?;
            let t = Instant::now();
            let preds = self.classifier.forward(&batch, profile)?;
            table.extend(&batch.names, preds)?;
            utils::trace(profile, "BATCH", &format!("{}/{}", i + 1, n_batches), t, std::time::Duration::ZERO);
            log::info!("Batch {}/{}: {} images", i + 1, n_batches, batch.len());
        }

        let load_time = loader.load_time();
        log::info!(
            "Classified {} images in {:.2?} (avg load {:.2?} per batch)",
            table.len(),
            start.elapsed(),
            load_time.avg()
        );
        Ok(table)
    }

    /// Runs the whole pipeline and writes `preds.txt`.
    pub fn run(&mut self) -> Result<Report> {
        let report_path = self.config.report_path()?;
        let layout = self.config.layout();

        let table = self.predict()?;
        self.check_class_names();
        let table = match layout {
            ClassLayout::Binary => table.into_binary()?,
            _ => table,
        };

        let report = Report::from_table(&table, layout)?;
        report
            .write_to(&report_path)
            .with_context(|| format!("{CROSS_MARK} Report not written"))?;
        if self.config.print_table {
            println!("{}", report.to_table());
        }

        self.visualize();
        Ok(report)
    }

    /// Configured class names, else the ones the model ships with.
    pub fn class_names(&self) -> Option<Vec<String>> {
        self.class_names.clone().or_else(|| self.classifier.model().class_names())
    }

    /// Whether the model's classes line up with the report columns, if known.
    pub fn class_names_match(&self) -> Option<bool> {
        let expected = ClassLayout::select(self.config.combine_pneumonia, false);
        self.class_names()
            .map(|names| names.iter().map(String::as_str).eq(expected.class_names().iter().copied()))
    }

    fn check_class_names(&self) {
        if self.class_names_match() == Some(false) {
            let expected = ClassLayout::select(self.config.combine_pneumonia, false);
            log::warn!(
                "Model classes {:?} differ from report columns {:?}",
                self.class_names().unwrap_or_default(),
                expected.class_names()
            );
        }
    }

    fn visualize(&mut self) {
        let (Some(visualizer), Some(out_dir)) = (self.visualizer.as_mut(), self.config.output_dir.as_ref()) else {
            return;
        };
        let request = VisualizeRequest {
            checkpoint: self.config.checkpoint.clone(),
            source: self.config.source.clone(),
            out_dir: out_dir.clone(),
        };
        match visualizer.visualize(self.classifier.model_mut(), &request) {
            Ok(()) => println!("Visualizations generated at {}", out_dir.display()),
            Err(e) => log::warn!("Visualization failed: {e:#}"),
        }
    }
}
