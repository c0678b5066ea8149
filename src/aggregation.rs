//! Crop averaging and the accumulated prediction table.

use anyhow::Result;
use ndarray::{Array2, ArrayView2, ArrayViewD, Axis};

/// `[batch * n_crops, classes]` scores to one mean row per image.
pub fn average_crops(scores: ArrayViewD<f32>, batch: usize, n_crops: usize) -> Result<Array2<f32>> {
    anyhow::ensure!(batch > 0 && n_crops > 0, "Empty batch");
    let rows = batch * n_crops;
    anyhow::ensure!(
        scores.shape().first() == Some(&rows),
        "Model returned {:?} for {} images x {} crops",
        scores.shape(),
        batch,
        n_crops
    );
    let classes = scores.len() / rows;
    let per_crop = scores.to_shape((batch, n_crops, classes))?;
    match per_crop.mean_axis(Axis(1)) {
        Some(mean) => Ok(mean),
        None => anyhow::bail!("Cannot average over zero crops"),
    }
}

/// Two columns per row: the best non-covid score and the covid score (last column).
pub fn collapse_binary(preds: ArrayView2<f32>) -> Result<Array2<f32>> {
    let classes = preds.ncols();
    anyhow::ensure!(classes >= 2, "Binary collapse needs at least 2 classes, got {classes}");
    let mut out = Array2::zeros((preds.nrows(), 2));
    for (row, mut dst) in preds.rows().into_iter().zip(out.rows_mut()) {
        let non_covid = row
            .slice(ndarray::s![..classes - 1])
            .fold(f32::NEG_INFINITY, |acc, &x| acc.max(x));
        dst[0] = non_covid;
        dst[1] = row[classes - 1];
    }
    Ok(out)
}

/// Predictions accumulated across batches with a parallel list of file names.
#[derive(Debug, Clone, Default)]
pub struct PredictionTable {
    predictions: Option<Array2<f32>>,
    names: Vec<String>,
}

impl PredictionTable {
    pub fn new() -> Self {
        Default::default()
    }

    /// Appends one batch. Row and name counts must match, and every batch must
    /// have the same number of classes.
    pub fn extend(&mut self, names: &[String], preds: Array2<f32>) -> Result<()> {
        anyhow::ensure!(
            preds.nrows() == names.len(),
            "Got {} predictions for {} images",
            preds.nrows(),
            names.len()
        );
        match &mut self.predictions {
            None => self.predictions = Some(preds),
            Some(table) => {
                anyhow::ensure!(
                    table.ncols() == preds.ncols(),
                    "Class count changed from {} to {}",
                    table.ncols(),
                    preds.ncols()
                );
                table.append(Axis(0), preds.view())?;
            }
        }
        self.names.extend_from_slice(names);
        self.check()
    }

    pub fn check(&self) -> Result<()> {
        anyhow::ensure!(
            self.len() == self.names.len(),
            "Prediction table out of sync: {} rows, {} names",
            self.len(),
            self.names.len()
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.predictions.as_ref().map_or(0, |p| p.nrows())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_classes(&self) -> Option<usize> {
        self.predictions.as_ref().map(|p| p.ncols())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn predictions(&self) -> Option<ArrayView2<f32>> {
        self.predictions.as_ref().map(|p| p.view())
    }

    /// Replaces every row by its binary collapse.
    pub fn into_binary(self) -> Result<Self> {
        let predictions = match &self.predictions {
            Some(p) => Some(collapse_binary(p.view())?),
            None => None,
        };
        Ok(Self { predictions, names: self.names })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Vec<f32>)> + '_ {
        self.names
            .iter()
            .enumerate()
            .map(move |(i, name)| {
                let row = self
                    .predictions
                    .as_ref()
                    .map(|p| p.row(i).to_vec())
                    .unwrap_or_default();
                (name.as_str(), row)
            })
    }
}
