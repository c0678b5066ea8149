use anyhow::Result;
use ndarray::{Array, IxDyn};

/// Model input, wrapper over [`Array<f32, IxDyn>`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct X(pub Array<f32, IxDyn>);

impl From<Array<f32, IxDyn>> for X {
    fn from(x: Array<f32, IxDyn>) -> Self {
        Self(x)
    }
}

impl From<Vec<f32>> for X {
    fn from(x: Vec<f32>) -> Self {
        Self(Array::from_vec(x).into_dyn())
    }
}

impl std::ops::Deref for X {
    type Target = Array<f32, IxDyn>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl X {
    pub fn from_shape_vec(shape: &[usize], xs: Vec<f32>) -> Result<Self> {
        Ok(Self::from(Array::from_shape_vec(shape, xs)?))
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self::from(Array::zeros(shape))
    }

    pub fn ndim(&self) -> usize {
        self.0.ndim()
    }

    /// Merges the first two axes: `[a, b, ...rest]` becomes `[a * b, ...rest]`.
    pub fn merge_leading(self) -> Result<Self> {
        let shape = self.0.shape();
        anyhow::ensure!(shape.len() >= 2, "Expected at least 2 dims, got shape {:?}", shape);
        let mut merged = vec![shape[0] * shape[1]];
        merged.extend_from_slice(&shape[2..]);
        let x = self.0.into_shape_clone(IxDyn(&merged))?;
        Ok(Self(x))
    }

    pub fn into_inner(self) -> Array<f32, IxDyn> {
        self.0
    }
}
