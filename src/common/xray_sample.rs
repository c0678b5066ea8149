use std::path::PathBuf;
use anyhow::Result;
use ndarray::Axis;
use crate::data::X;

/// One decoded image after the crop transform: `[n_crops, 3, h, w]`.
#[derive(Debug, Clone)]
pub struct XraySample {
    pub name: String,
    pub path: PathBuf,
    pub crops: X,
}

impl XraySample {
    pub fn new(path: PathBuf, crops: X) -> Self {
        let name = file_name(&path);
        Self { name, path, crops }
    }

    pub fn n_crops(&self) -> usize {
        self.crops.shape().first().copied().unwrap_or(0)
    }
}

/// Stacked samples: `[batch, n_crops, 3, h, w]` plus their names, in load order.
#[derive(Debug, Clone)]
pub struct XrayBatch {
    pub crops: X,
    pub names: Vec<String>,
}

impl XrayBatch {
    pub fn stack(samples: Vec<XraySample>) -> Result<Self> {
        anyhow::ensure!(!samples.is_empty(), "Cannot build an empty batch");
        let views: Vec<_> = samples.iter().map(|s| s.crops.view()).collect();
        let crops = ndarray::stack(Axis(0), &views)?;
        let names = samples.into_iter().map(|s| s.name).collect();
        Ok(Self { crops: X::from(crops), names })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn n_crops(&self) -> usize {
        self.crops.shape().get(1).copied().unwrap_or(0)
    }
}

/// Last path component, the way the report names images.
pub(crate) fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    fn sample(name: &str, fill: f32) -> XraySample {
        let crops = Array::from_elem(IxDyn(&[10, 3, 4, 4]), fill);
        XraySample::new(PathBuf::from("a/b").join(name), X::from(crops))
    }

    #[test]
    fn stacking_keeps_order() {
        let batch = XrayBatch::stack(vec![sample("1.jpg", 1.0), sample("2.jpg", 2.0)]).unwrap();
        assert_eq!(batch.crops.shape(), &[2, 10, 3, 4, 4]);
        assert_eq!(batch.names, vec!["1.jpg", "2.jpg"]);
        assert_eq!(batch.crops[&[1usize, 9, 2, 3, 3][..]], 2.0);
        assert_eq!(batch.n_crops(), 10);
    }

    #[test]
    fn empty_batch_is_an_error() {
        assert!(XrayBatch::stack(vec![]).is_err());
    }
}
