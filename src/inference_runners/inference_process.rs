use std::time::Instant;
use crate::data::{Xs, X};
use crate::utils;

/// The classifier network as a black box: one tensor in, every declared output back.
pub trait InferenceModel: Send {
    /// Runs one forward pass on `[n, 3, h, w]`.
    fn forward(&mut self, xs: X) -> anyhow::Result<Xs>;

    /// Class names shipped with the model, if any.
    fn class_names(&self) -> Option<Vec<String>> {
        None
    }

    fn describe(&self) -> String {
        String::from("model")
    }
}

impl<M: InferenceModel + ?Sized> InferenceModel for Box<M> {
    fn forward(&mut self, xs: X) -> anyhow::Result<Xs> {
        (**self).forward(xs)
    }

    fn class_names(&self) -> Option<Vec<String>> {
        (**self).class_names()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

pub trait InferenceProcess {
    type Input;
    type Output;

    /// Pre-process the input data.
    fn preprocess(&self, xs: &Self::Input) -> anyhow::Result<X>;

    /// Executes the model on the preprocessed data.
    fn inference(&mut self, xs: X) -> anyhow::Result<Xs>;

    /// Post-process the model's output.
    fn postprocess(&self, ys: Xs, xs0: &Self::Input) -> anyhow::Result<Self::Output>;

    /// Executes the full pipeline.
    fn run(&mut self, xs: &Self::Input) -> anyhow::Result<Self::Output> {
        let ys = self.preprocess(xs)?;
        let ys = self.inference(ys)?;
        let ys = self.postprocess(ys, xs)?;
        Ok(ys)
    }

    /// Executes the full pipeline, tracing every stage.
    fn forward(&mut self, xs: &Self::Input, profile: bool) -> anyhow::Result<Self::Output> {
        let start = Instant::now();
        let mut _elapsed = start.elapsed();

        let ys = self.preprocess(xs)?;
        _elapsed = utils::trace(profile, "TIME", "Preprocess", start, _elapsed);

        let ys = self.inference(ys)?;
        _elapsed = utils::trace(profile, "TIME", "Inference", start, _elapsed);

        let ys = self.postprocess(ys, xs)?;
        utils::trace(profile, "TIME", "Postprocess", start, _elapsed);

        Ok(ys)
    }
}
