use anyhow::Result;
use ndarray::Array2;
use crate::aggregation::average_crops;
use crate::common::XrayBatch;
use crate::data::{Xs, X};
use crate::inference_runners::{InferenceModel, InferenceProcess};

/// Runs a batch of ten-crop stacks through the model and averages the crops.
pub struct CropClassifier<M: InferenceModel> {
    model: M,
}

impl<M: InferenceModel> CropClassifier<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }
}

impl<M: InferenceModel> InferenceProcess for CropClassifier<M> {
    type Input = XrayBatch;
    type Output = Array2<f32>;

    /// `[batch, crops, c, h, w]` becomes `[batch * crops, c, h, w]`.
    fn preprocess(&self, xs: &XrayBatch) -> Result<X> {
        anyhow::ensure!(
            xs.crops.ndim() == 5,
            "Expected [batch, crops, channels, height, width], got {:?}",
            xs.crops.shape()
        );
        xs.crops.clone().merge_leading()
    }

    fn inference(&mut self, xs: X) -> Result<Xs> {
        self.model.forward(xs)
    }

    /// Only the first output carries class scores.
    fn postprocess(&self, ys: Xs, xs0: &XrayBatch) -> Result<Array2<f32>> {
        let scores = match ys.into_first() {
            Some(scores) => scores,
            None => anyhow::bail!("Model returned no outputs"),
        };
        average_crops(scores.view(), xs0.len(), xs0.n_crops())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    /// Scores every crop by its mean pixel value, as a 2-class output.
    struct MeanPixel;

    impl InferenceModel for MeanPixel {
        fn forward(&mut self, xs: X) -> Result<Xs> {
            let n = xs.shape()[0];
            let per_row = xs.len() / n;
            let mut rows = Vec::with_capacity(n * 2);
            for row in xs.as_slice().unwrap().chunks(per_row) {
                let mean = row.iter().sum::<f32>() / per_row as f32;
                rows.extend([mean, 1.0 - mean]);
            }
            let mut ys = Xs::new();
            ys.push_kv("probs", X::from_shape_vec(&[n, 2], rows)?)?;
            ys.push_kv("features", X::zeros(&[n, 8]))?;
            Ok(ys)
        }
    }

    #[test]
    fn averages_over_crops() {
        // image i, crop k is filled with k / 10
        let crops = Array::from_shape_fn(IxDyn(&[2, 10, 3, 2, 2]), |d| d[1] as f32 / 10.0);
        let batch = XrayBatch { crops: X::from(crops), names: vec!["a".into(), "b".into()] };

        let mut classifier = CropClassifier::new(MeanPixel);
        let preds = classifier.run(&batch).unwrap();
        assert_eq!(preds.dim(), (2, 2));
        for row in preds.rows() {
            assert!((row[0] - 0.45).abs() < 1e-6);
            assert!((row[1] - 0.55).abs() < 1e-6);
        }
    }

    #[test]
    fn rejects_flat_input() {
        let batch = XrayBatch { crops: X::zeros(&[2, 3, 2, 2]), names: vec!["a".into(), "b".into()] };
        assert!(CropClassifier::new(MeanPixel).run(&batch).is_err());
    }
}
