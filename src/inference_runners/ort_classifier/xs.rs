use anyhow::Result;
use crate::data::X;

/// Named model outputs, in the order the model declares them.
#[derive(Debug, Clone, Default)]
pub struct Xs {
    names: Vec<String>,
    values: Vec<X>,
}

impl From<X> for Xs {
    fn from(x: X) -> Self {
        let mut xs = Self::new();
        xs.push(x);
        xs
    }
}

impl From<Vec<X>> for Xs {
    fn from(xs: Vec<X>) -> Self {
        let mut ys = Self::new();
        for x in xs {
            ys.push(x);
        }
        ys
    }
}

impl std::ops::Index<usize> for Xs {
    type Output = X;

    fn index(&self, index: usize) -> &Self::Output {
        &self.values[index]
    }
}

impl IntoIterator for Xs {
    type Item = X;
    type IntoIter = std::vec::IntoIter<X>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl Xs {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn push(&mut self, x: X) {
        let name = format!("{}", self.values.len());
        self.names.push(name);
        self.values.push(x);
    }

    pub fn push_kv(&mut self, key: &str, x: X) -> Result<()> {
        if self.names.iter().any(|n| n == key) {
            anyhow::bail!("Output `{key}` was pushed twice");
        }
        self.names.push(key.to_string());
        self.values.push(x);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&X> {
        self.names.iter().position(|n| n == key).map(|i| &self.values[i])
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Keeps only the first output.
    pub fn into_first(self) -> Option<X> {
        self.values.into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_declaration_order() {
        let mut xs = Xs::new();
        xs.push_kv("probs", X::from(vec![0.5])).unwrap();
        xs.push_kv("attention", X::from(vec![1.0, 2.0])).unwrap();
        assert!(xs.push_kv("probs", X::from(vec![0.0])).is_err());

        assert_eq!(xs.len(), 2);
        assert_eq!(xs.names(), &["probs", "attention"]);
        assert_eq!(xs.get("attention").unwrap().len(), 2);
        assert_eq!(xs.into_first().unwrap()[&[0usize][..]], 0.5);
    }
}
