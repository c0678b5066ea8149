//! Saliency visualization after the report is written.

use std::path::PathBuf;
use std::process::Command;
use anyhow::{Context, Result};
use crate::common::SourceKind;
use crate::inference_runners::InferenceModel;

/// What a visualizer is asked to explain.
#[derive(Debug, Clone)]
pub struct VisualizeRequest {
    pub checkpoint: PathBuf,
    pub source: SourceKind,
    pub out_dir: PathBuf,
}

impl VisualizeRequest {
    pub fn img_dir(&self) -> PathBuf {
        self.source.root().to_path_buf()
    }
}

/// Produces saliency maps for the images of a finished run.
pub trait SaliencyVisualizer {
    fn visualize(&mut self, model: &mut dyn InferenceModel, request: &VisualizeRequest) -> Result<()>;
}

/// Runs an external saliency program, which loads the checkpoint itself.
pub struct CommandVisualizer {
    program: String,
    extra_args: Vec<String>,
}

impl CommandVisualizer {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
        }
    }

    /// Splits a shell-style command line on whitespace: the first word is the program.
    pub fn from_command_line(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace().map(String::from);
        match words.next() {
            Some(program) => Ok(Self {
                program,
                extra_args: words.collect(),
            }),
            None => anyhow::bail!("Empty visualizer command"),
        }
    }

    pub fn with_args(mut self, args: &[&str]) -> Self {
        self.extra_args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    pub fn command(&self, request: &VisualizeRequest) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.extra_args)
            .arg("--checkpoint")
            .arg(&request.checkpoint)
            .arg("--img_dir")
            .arg(request.img_dir())
            .arg("--visualize_dir")
            .arg(&request.out_dir);
        if let SourceKind::List { list_file, .. } = &request.source {
            cmd.arg("--image_list").arg(list_file);
        }
        cmd
    }
}

impl SaliencyVisualizer for CommandVisualizer {
    fn visualize(&mut self, model: &mut dyn InferenceModel, request: &VisualizeRequest) -> Result<()> {
        log::info!("Running {} for {}", self.program, model.describe());
        let status = self
            .command(request)
            .status()
            .with_context(|| format!("Failed to launch visualizer {}", self.program))?;
        anyhow::ensure!(status.success(), "Visualizer {} exited with {}", self.program, status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> VisualizeRequest {
        VisualizeRequest {
            checkpoint: PathBuf::from("models/best.onnx"),
            source: SourceKind::Directory(PathBuf::from("imgs")),
            out_dir: PathBuf::from("out"),
        }
    }

    #[test]
    fn builds_arguments() {
        let vis = CommandVisualizer::from_command_line("python3 tools/rise.py").unwrap();
        let cmd = vis.command(&request());
        assert_eq!(cmd.get_program(), "python3");
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, vec![
            "tools/rise.py", "--checkpoint", "models/best.onnx",
            "--img_dir", "imgs", "--visualize_dir", "out",
        ]);
        assert!(CommandVisualizer::from_command_line("  ").is_err());
    }

    #[test]
    fn list_source_is_forwarded() {
        let mut req = request();
        req.source = SourceKind::List { list_file: PathBuf::from("test.txt"), root: PathBuf::from("imgs") };
        let args: Vec<_> = CommandVisualizer::new("vis")
            .with_args(&["-q"])
            .command(&req)
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args.first().map(String::as_str), Some("-q"));
        assert_eq!(&args[args.len() - 2..], &["--image_list", "test.txt"]);
    }
}
