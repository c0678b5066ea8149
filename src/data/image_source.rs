//! Where images come from: a recursive directory walk or a list file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use crate::common::{SourceKind, XraySample};
use crate::data::TenCrop;
use crate::utils;

/// Random-access image dataset. `get` decodes and transforms one image.
pub trait ImageSource: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn path(&self, index: usize) -> Option<&Path>;

    fn get(&self, index: usize) -> Result<XraySample>;
}

/// Opens the source described by `kind`, decided once at startup.
pub fn open_source(kind: &SourceKind, transform: TenCrop) -> Result<Arc<dyn ImageSource>> {
    let source: Arc<dyn ImageSource> = match kind {
        SourceKind::Directory(dir) => Arc::new(DirectorySource::new(dir, transform)?),
        SourceKind::List { list_file, root } => Arc::new(ListSource::new(list_file, root, transform)?),
    };
    log::info!("Found {} images", source.len());
    Ok(source)
}

/// Decodes by content, not extension.
fn decode(path: &Path) -> Result<image::DynamicImage> {
    Ok(image::ImageReader::open(path)?.with_guessed_format()?.decode()?)
}

fn load(path: &Path, transform: &TenCrop) -> Result<XraySample> {
    let image = decode(path)
        .with_context(|| format!("Failed to read image {}", path.display()))?
        .to_rgb8();
    let crops = transform
        .apply(image)
        .with_context(|| format!("Failed to transform image {}", path.display()))?;
    Ok(XraySample::new(path.to_path_buf(), crops))
}

/// Every `.jpg` below a directory, in sorted path order.
pub struct DirectorySource {
    paths: Vec<PathBuf>,
    transform: TenCrop,
}

impl DirectorySource {
    pub fn new<P: AsRef<Path>>(dir: P, transform: TenCrop) -> Result<Self> {
        let paths = find_images(dir.as_ref(), "jpg")?;
        Ok(Self { paths, transform })
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl ImageSource for DirectorySource {
    fn len(&self) -> usize {
        self.paths.len()
    }

    fn path(&self, index: usize) -> Option<&Path> {
        self.paths.get(index).map(|p| p.as_path())
    }

    fn get(&self, index: usize) -> Result<XraySample> {
        match self.paths.get(index) {
            Some(path) => load(path, &self.transform),
            None => anyhow::bail!("Image index {index} out of range ({} images)", self.paths.len()),
        }
    }
}

/// Recursive `**/*.<extension>` match. Case sensitive, hidden entries skipped.
pub fn find_images(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("Image directory {} does not exist", dir.display());
    }
    let pattern = format!("{}/**/*.{}", Pattern::escape(&dir.to_string_lossy()), extension);
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };

    let mut paths = Vec::new();
    for entry in glob::glob_with(&pattern, options)? {
        let path = entry?;
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Images named in a list file, one per line. The first whitespace separated
/// field is the path (relative paths resolve against `root`); anything after it
/// is ignored.
pub struct ListSource {
    paths: Vec<PathBuf>,
    transform: TenCrop,
}

impl ListSource {
    pub fn new<P: AsRef<Path>, R: AsRef<Path>>(list_file: P, root: R, transform: TenCrop) -> Result<Self> {
        let list_file = list_file.as_ref();
        let lines = utils::file_to_vec(list_file)
            .with_context(|| format!("Failed to read image list {}", list_file.display()))?;
        let paths = lines
            .iter()
            .filter_map(|line| line.split_whitespace().next())
            .map(|name| root.as_ref().join(name))
            .collect();
        Ok(Self { paths, transform })
    }
}

impl ImageSource for ListSource {
    fn len(&self) -> usize {
        self.paths.len()
    }

    fn path(&self, index: usize) -> Option<&Path> {
        self.paths.get(index).map(|p| p.as_path())
    }

    fn get(&self, index: usize) -> Result<XraySample> {
        match self.paths.get(index) {
            Some(path) => load(path, &self.transform),
            None => anyhow::bail!("Image index {index} out of range ({} images)", self.paths.len()),
        }
    }
}
