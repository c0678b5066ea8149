extern crate cxr_classify;

use std::path::Path;
use std::sync::Arc;
use anyhow::Result;
use image::{Rgb, RgbImage};
use parking_lot::Mutex;
use cxr_classify::common::{RunConfig, SourceKind};
use cxr_classify::data::{open_source, TenCrop, Xs, X};
use cxr_classify::inference_runners::InferenceModel;
use cxr_classify::pipeline::Pipeline;
use cxr_classify::visualize::{SaliencyVisualizer, VisualizeRequest};

/// Returns the same class scores for every crop, plus two unused outputs.
struct FixedScores {
    scores: Vec<f32>,
    calls: usize,
    names: Option<Vec<String>>,
}

impl FixedScores {
    fn new(scores: &[f32]) -> Self {
        Self { scores: scores.to_vec(), calls: 0, names: None }
    }

    fn with_names(mut self, names: &[&str]) -> Self {
        self.names = Some(names.iter().map(|s| s.to_string()).collect());
        self
    }
}

impl InferenceModel for FixedScores {
    fn forward(&mut self, xs: X) -> Result<Xs> {
        assert_eq!(xs.ndim(), 4);
        self.calls += 1;
        let n = xs.shape()[0];
        let k = self.scores.len();
        let flat: Vec<f32> = (0..n).flat_map(|_| self.scores.iter().copied()).collect();

        let mut ys = Xs::new();
        ys.push_kv("probs", X::from_shape_vec(&[n, k], flat)?)?;
        ys.push_kv("pooled", X::zeros(&[n, 16]))?;
        ys.push_kv("features", X::zeros(&[n, 4, 2, 2]))?;
        Ok(ys)
    }

    fn class_names(&self) -> Option<Vec<String>> {
        self.names.clone()
    }
}

struct Recording(Arc<Mutex<Vec<VisualizeRequest>>>);

impl SaliencyVisualizer for Recording {
    fn visualize(&mut self, _model: &mut dyn InferenceModel, request: &VisualizeRequest) -> Result<()> {
        self.0.lock().push(request.clone());
        Ok(())
    }
}

struct Failing;

impl SaliencyVisualizer for Failing {
    fn visualize(&mut self, _model: &mut dyn InferenceModel, _request: &VisualizeRequest) -> Result<()> {
        anyhow::bail!("no display")
    }
}

fn write_jpg(path: &Path, shade: u8) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbImage::from_pixel(300, 260, Rgb([shade, shade, shade])).save(path).unwrap();
}

fn pipeline(config: RunConfig, model: FixedScores) -> Pipeline<FixedScores> {
    let source = open_source(&config.source, TenCrop::default()).unwrap();
    Pipeline::new(config, model, source)
}

#[cfg(test)]
#[tokio::test]
async fn single_image_report() {
    let imgs = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_jpg(&imgs.path().join("one.jpg"), 120);

    let config = RunConfig::new(imgs.path()).with_output_dir(Some(out.path()));
    let report = pipeline(config, FixedScores::new(&[0.1, 0.2, 0.3, 0.4])).run().unwrap();
    assert_eq!(report.len(), 1);

    let text = std::fs::read_to_string(out.path().join("preds.txt")).unwrap();
    assert_eq!(
        text,
        "['Name', 'Normal', 'Bacterial', 'Viral', 'COVID-19']\n\
         [['one.jpg', '10.0 %', '20.0 %', '30.0 %', '40.0 %']]\n"
    );
}

#[tokio::test]
async fn binary_report() {
    let imgs = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_jpg(&imgs.path().join("one.jpg"), 120);

    let config = RunConfig::new(imgs.path())
        .with_output_dir(Some(out.path()))
        .with_combine_pneumonia(true)
        .with_binary_eval(true);
    pipeline(config, FixedScores::new(&[0.1, 0.2, 0.3, 0.4])).run().unwrap();

    let text = std::fs::read_to_string(out.path().join("preds.txt")).unwrap();
    assert_eq!(text, "['Name', 'Non-Covid', 'Covid']\n[['one.jpg', '30.0 %', '40.0 %']]\n");
}

#[tokio::test]
async fn combined_pneumonia_report() {
    let imgs = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_jpg(&imgs.path().join("a.jpg"), 10);

    let config = RunConfig::new(imgs.path())
        .with_output_dir(Some(out.path()))
        .with_combine_pneumonia(true);
    pipeline(config, FixedScores::new(&[0.5, 0.25, 0.25])).run().unwrap();

    let text = std::fs::read_to_string(out.path().join("preds.txt")).unwrap();
    assert_eq!(
        text,
        "['Name', 'Normal', 'Pneumonia', 'COVID-19']\n[['a.jpg', '50.0 %', '25.0 %', '25.0 %']]\n"
    );
}

#[tokio::test]
async fn one_row_per_image_across_batches() {
    let imgs = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    for i in 0..5 {
        write_jpg(&imgs.path().join(format!("img_{i}.jpg")), 40 * i as u8);
    }
    write_jpg(&imgs.path().join("nested/img_5.jpg"), 200);
    write_jpg(&imgs.path().join("skip.png"), 200);

    let config = RunConfig::new(imgs.path())
        .with_output_dir(Some(out.path()))
        .with_batch_size(4)
        .with_num_workers(2);
    let mut pipeline = pipeline(config, FixedScores::new(&[0.7, 0.1, 0.1, 0.1]));
    let report = pipeline.run().unwrap();

    assert_eq!(pipeline.model().calls, 2);
    let names: Vec<&str> = report.rows.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["img_0.jpg", "img_1.jpg", "img_2.jpg", "img_3.jpg", "img_4.jpg", "img_5.jpg"]);
    for row in &report.rows {
        assert_eq!(row.scores, vec!["70.0 %", "10.0 %", "10.0 %", "10.0 %"]);
    }
}

#[tokio::test]
async fn list_source_report() {
    let imgs = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_jpg(&imgs.path().join("b.jpg"), 30);
    write_jpg(&imgs.path().join("a.jpg"), 60);
    let list = imgs.path().join("test_list.txt");
    std::fs::write(&list, "b.jpg 0 0 0 1\na.jpg 1 0 0 0\n").unwrap();

    let config = RunConfig::new(imgs.path())
        .with_source(SourceKind::List { list_file: list, root: imgs.path().to_path_buf() })
        .with_output_dir(Some(out.path()));
    let report = pipeline(config, FixedScores::new(&[0.25, 0.25, 0.25, 0.25])).run().unwrap();
    let names: Vec<&str> = report.rows.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["b.jpg", "a.jpg"]);
}

#[tokio::test]
async fn empty_directory_writes_empty_report() {
    let imgs = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let config = RunConfig::new(imgs.path()).with_output_dir(Some(out.path()));
    let report = pipeline(config, FixedScores::new(&[0.1, 0.2, 0.3, 0.4])).run().unwrap();
    assert!(report.is_empty());

    let text = std::fs::read_to_string(out.path().join("preds.txt")).unwrap();
    assert_eq!(text, "['Name', 'Normal', 'Bacterial', 'Viral', 'COVID-19']\n[]\n");
}

#[tokio::test]
async fn visualizer_gets_the_run() {
    let imgs = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_jpg(&imgs.path().join("one.jpg"), 120);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let config = RunConfig::new(imgs.path())
        .with_output_dir(Some(out.path()))
        .with_checkpoint("models/best.onnx");
    pipeline(config, FixedScores::new(&[0.1, 0.2, 0.3, 0.4]))
        .with_visualizer(Box::new(Recording(Arc::clone(&seen))))
        .run()
        .unwrap();

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].out_dir, out.path());
    assert_eq!(seen[0].img_dir(), imgs.path());
    assert_eq!(seen[0].checkpoint, Path::new("models/best.onnx"));
}

#[tokio::test]
async fn visualizer_failure_keeps_report() {
    let imgs = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_jpg(&imgs.path().join("one.jpg"), 120);

    let config = RunConfig::new(imgs.path()).with_output_dir(Some(out.path()));
    let report = pipeline(config, FixedScores::new(&[0.1, 0.2, 0.3, 0.4]))
        .with_visualizer(Box::new(Failing))
        .run();
    assert!(report.is_ok());
    assert!(out.path().join("preds.txt").is_file());
}

#[tokio::test]
async fn missing_output_dir_fails_before_inference() {
    let imgs = tempfile::tempdir().unwrap();
    write_jpg(&imgs.path().join("one.jpg"), 120);

    let config = RunConfig::new(imgs.path());
    let mut pipeline = pipeline(config, FixedScores::new(&[0.1, 0.2, 0.3, 0.4]));
    assert!(pipeline.run().is_err());
    assert_eq!(pipeline.model().calls, 0);
}

#[tokio::test]
async fn corrupt_image_aborts_the_run() {
    let imgs = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_jpg(&imgs.path().join("a.jpg"), 120);
    std::fs::write(imgs.path().join("b.jpg"), b"garbage").unwrap();

    let config = RunConfig::new(imgs.path()).with_output_dir(Some(out.path()));
    assert!(pipeline(config, FixedScores::new(&[0.1, 0.2, 0.3, 0.4])).run().is_err());
    assert!(!out.path().join("preds.txt").exists());
}

#[tokio::test]
async fn configured_class_names_override_model_metadata() {
    let imgs = tempfile::tempdir().unwrap();
    let full = ["Normal", "Bacterial", "Viral", "COVID-19"];

    let unnamed = pipeline(RunConfig::new(imgs.path()), FixedScores::new(&[0.25; 4]));
    assert_eq!(unnamed.class_names_match(), None);

    let model = FixedScores::new(&[0.25; 4]).with_names(&["0", "1", "2", "3"]);
    let mislabelled = pipeline(RunConfig::new(imgs.path()), model);
    assert_eq!(mislabelled.class_names_match(), Some(false));

    let model = FixedScores::new(&[0.25; 4]).with_names(&["0", "1", "2", "3"]);
    let configured = pipeline(RunConfig::new(imgs.path()), model)
        .with_class_names(Some(full.iter().map(|s| s.to_string()).collect()));
    assert_eq!(configured.class_names().unwrap(), full);
    assert_eq!(configured.class_names_match(), Some(true));

    let combined = pipeline(RunConfig::new(imgs.path()).with_combine_pneumonia(true), FixedScores::new(&[0.25; 3]))
        .with_class_names(Some(full.iter().map(|s| s.to_string()).collect()));
    assert_eq!(combined.class_names_match(), Some(false));
}
