use anyhow::Result;
use ndarray::Axis;
use rayon::prelude::*;
use crate::data::{ConfigOrt, Xs, X};
use crate::inference_runners::{InferenceModel, OrtEngine};

/// Replicates a model on several devices. Every forward pass splits the batch
/// into contiguous chunks, runs them side by side and concatenates the outputs
/// back in input order.
pub struct DataParallel<M: InferenceModel> {
    replicas: Vec<M>,
}

impl DataParallel<OrtEngine> {
    /// One ORT session per configured device.
    pub fn from_config(config: &ConfigOrt) -> Result<Self> {
        let replicas = config
            .devices()
            .into_iter()
            .map(|device| OrtEngine::new(config, device))
            .collect::<Result<Vec<_>>>()?;
        log::info!("Using {} replicas", replicas.len());
        Self::new(replicas)
    }
}

impl<M: InferenceModel> DataParallel<M> {
    pub fn new(replicas: Vec<M>) -> Result<Self> {
        anyhow::ensure!(!replicas.is_empty(), "Data parallel model needs at least one replica");
        Ok(Self { replicas })
    }

    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }
}

impl<M: InferenceModel> InferenceModel for DataParallel<M> {
    fn forward(&mut self, xs: X) -> Result<Xs> {
        let n = xs.shape().first().copied().unwrap_or(0);
        if self.replicas.len() == 1 || n <= 1 {
            return self.replicas[0].forward(xs);
        }

        let chunk = n.div_ceil(self.replicas.len());
        let chunks: Vec<X> = xs
            .axis_chunks_iter(Axis(0), chunk)
            .map(|c| X::from(c.to_owned()))
            .collect();

        let outputs = self
            .replicas
            .par_iter_mut()
            .zip(chunks.into_par_iter())
            .map(|(replica, x)| replica.forward(x))
            .collect::<Result<Vec<Xs>>>()?;

        gather(outputs)
    }

    fn class_names(&self) -> Option<Vec<String>> {
        self.replicas[0].class_names()
    }

    fn describe(&self) -> String {
        let devices: Vec<String> = self.replicas.iter().map(|r| r.describe()).collect();
        format!("data parallel over [{}]", devices.join(", "))
    }
}

/// Concatenates every output along the batch axis, keeping output names.
fn gather(outputs: Vec<Xs>) -> Result<Xs> {
    let first = match outputs.first() {
        Some(first) => first,
        None => anyhow::bail!("No replica produced an output"),
    };
    let names = first.names().to_vec();
    let n_outputs = first.len();
    for ys in outputs.iter() {
        anyhow::ensure!(ys.len() == n_outputs, "Replicas disagree on the number of outputs");
    }

    let mut gathered = Xs::new();
    for (i, name) in names.iter().enumerate() {
        let views: Vec<_> = outputs.iter().map(|ys| ys[i].view()).collect();
        let y = ndarray::concatenate(Axis(0), &views)?;
        gathered.push_kv(name, X::from(y))?;
    }
    Ok(gathered)
}
