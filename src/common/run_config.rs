use std::path::{Path, PathBuf};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use crate::common::ClassLayout;

/// Where the pipeline reads its images from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    /// Every `.jpg` below a directory.
    Directory(PathBuf),
    /// One image path per line in a list file, resolved against `root`.
    List { list_file: PathBuf, root: PathBuf },
}

impl SourceKind {
    pub fn root(&self) -> &Path {
        match self {
            SourceKind::Directory(dir) => dir,
            SourceKind::List { root, .. } => root,
        }
    }
}

/// Pipeline options that used to live in module-level flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub source: SourceKind,
    pub checkpoint: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub combine_pneumonia: bool,
    pub binary_eval: bool,
    pub batch_size: usize,
    pub num_workers: usize,
    pub prefetch: usize,
    pub print_table: bool,
    pub profile: bool,
}

pub const REPORT_FILE: &str = "preds.txt";

impl RunConfig {
    pub fn new<P: Into<PathBuf>>(img_dir: P) -> Self {
        Self {
            source: SourceKind::Directory(img_dir.into()),
            checkpoint: PathBuf::from("models/Global_Best.onnx"),
            output_dir: None,
            combine_pneumonia: false,
            binary_eval: false,
            batch_size: 64,
            num_workers: 8,
            prefetch: 2,
            print_table: false,
            profile: false,
        }
    }

    pub fn with_source(mut self, source: SourceKind) -> Self {
        self.source = source;
        self
    }

    pub fn with_checkpoint<P: Into<PathBuf>>(mut self, checkpoint: P) -> Self {
        self.checkpoint = checkpoint.into();
        self
    }

    pub fn with_output_dir<P: Into<PathBuf>>(mut self, output_dir: Option<P>) -> Self {
        self.output_dir = output_dir.map(Into::into);
        self
    }

    pub fn with_combine_pneumonia(mut self, x: bool) -> Self {
        self.combine_pneumonia = x;
        self
    }

    pub fn with_binary_eval(mut self, x: bool) -> Self {
        self.binary_eval = x;
        self
    }

    pub fn with_batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    pub fn with_num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    pub fn with_prefetch(mut self, n: usize) -> Self {
        self.prefetch = n;
        self
    }

    pub fn with_print_table(mut self, x: bool) -> Self {
        self.print_table = x;
        self
    }

    pub fn with_profile(mut self, x: bool) -> Self {
        self.profile = x;
        self
    }

    pub fn layout(&self) -> ClassLayout {
        ClassLayout::select(self.combine_pneumonia, self.binary_eval)
    }

    pub fn report_path(&self) -> Result<PathBuf> {
        match &self.output_dir {
            Some(dir) => Ok(dir.join(REPORT_FILE)),
            None => anyhow::bail!("An output directory (--visualize_dir) is required to write {REPORT_FILE}"),
        }
    }

    /// Checks done before any model is loaded.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.batch_size > 0, "Batch size must be positive");
        self.report_path()?;
        let root = self.source.root();
        if !root.is_dir() {
            anyhow::bail!("Image directory {} does not exist", root.display());
        }
        if let SourceKind::List { list_file, .. } = &self.source {
            anyhow::ensure!(list_file.is_file(), "Image list {} does not exist", list_file.display());
        }
        Ok(())
    }
}

impl std::fmt::Display for RunConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Image Source: {:?}\n\
        Checkpoint: {}\n\
        Output Directory: {:?}\n\
        Class Layout: {:?}\n\
        Batch Size: {} | Workers: {} | Prefetch: {}",
                self.source, self.checkpoint.display(), self.output_dir,
                self.layout(), self.batch_size, self.num_workers, self.prefetch)
    }
}
