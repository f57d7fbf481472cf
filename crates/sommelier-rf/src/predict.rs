//! Prediction methods for the random-forest ensemble.

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::dataset::Example;
use crate::error::RfError;
use crate::forest::RandomForest;
use crate::tree::DecisionTree;

/// How per-tree outputs are merged into one ensemble output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Combiner {
    /// Arithmetic mean of the trees' outputs, per dimension.
    #[default]
    Averaging,
}

impl Combiner {
    /// Merge per-tree outputs (`per_tree[tree][dimension]`) into one value per dimension.
    ///
    /// Sums run in tree order so the result does not depend on thread
    /// scheduling. Returns zeros when `per_tree` is empty.
    #[must_use]
    pub fn combine(&self, per_tree: &[Vec<f64>], n_dimensions: usize) -> Vec<f64> {
        match self {
            Combiner::Averaging => {
                let mut sums = vec![0.0f64; n_dimensions];
                for outputs in per_tree {
                    for (sum, value) in sums.iter_mut().zip(outputs) {
                        *sum += value;
                    }
                }
                if !per_tree.is_empty() {
                    let n = per_tree.len() as f64;
                    sums.iter_mut().for_each(|s| *s /= n);
                }
                sums
            }
        }
    }
}

/// Predicted values for one example, keyed by target dimension name.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Prediction {
    values: Vec<(String, f64)>,
}

impl Prediction {
    pub(crate) fn new(values: Vec<(String, f64)>) -> Self {
        Self { values }
    }

    /// Return the predicted value for a named dimension.
    #[must_use]
    pub fn value(&self, dimension: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(name, _)| name == dimension)
            .map(|&(_, v)| v)
    }

    /// Return the value of the first dimension.
    #[must_use]
    pub fn first(&self) -> Option<f64> {
        self.values.first().map(|&(_, v)| v)
    }

    /// Return all `(dimension, value)` pairs in dimension order.
    #[must_use]
    pub fn values(&self) -> &[(String, f64)] {
        &self.values
    }

    /// Iterate over `(dimension, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(name, v)| (name.as_str(), *v))
    }
}

impl RandomForest {
    /// Predict every target dimension for one example.
    ///
    /// Features are matched by name; features the model does not know are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::MissingFeature`] when a split on a walked path
    /// tests a feature the example lacks.
    pub fn predict(&self, example: &Example) -> Result<Prediction, RfError> {
        let values = self.predict_aligned(&self.align(example))?;
        Ok(self.label(values))
    }

    /// Predict a batch of examples in parallel, preserving input order.
    ///
    /// # Errors
    ///
    /// Returns the first [`RfError::MissingFeature`] encountered.
    pub fn predict_batch(&self, examples: &[Example]) -> Result<Vec<Prediction>, RfError> {
        examples
            .par_iter()
            .map(|example| self.predict(example))
            .collect()
    }

    /// Return each tree's raw output for one example (`[tree][dimension]`).
    ///
    /// # Errors
    ///
    /// Returns [`RfError::MissingFeature`] as for [`predict`](Self::predict).
    pub fn tree_predictions(&self, example: &Example) -> Result<Vec<Vec<f64>>, RfError> {
        let sample = self.align(example);
        self.trees
            .iter()
            .map(|tree| tree.predict_aligned(&sample))
            .collect()
    }

    /// Lay out an example's features in schema order.
    pub(crate) fn align(&self, example: &Example) -> Vec<Option<f64>> {
        self.feature_names
            .iter()
            .map(|name| example.feature(name))
            .collect()
    }

    /// Predict from features already in schema order.
    pub(crate) fn predict_aligned(&self, sample: &[Option<f64>]) -> Result<Vec<f64>, RfError> {
        let per_tree: Vec<Vec<f64>> = self
            .trees
            .iter()
            .map(|tree| tree.predict_aligned(sample))
            .collect::<Result<_, _>>()?;
        Ok(self.combiner.combine(&per_tree, self.target_names.len()))
    }

    fn label(&self, values: Vec<f64>) -> Prediction {
        Prediction::new(self.target_names.iter().cloned().zip(values).collect())
    }

    /// Return the number of trees in the ensemble.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Return the number of features this forest was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Return the feature schema.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Return the output dimension names.
    #[must_use]
    pub fn target_names(&self) -> &[String] {
        &self.target_names
    }

    /// Return the trees in index order.
    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Return the combiner.
    #[must_use]
    pub fn combiner(&self) -> Combiner {
        self.combiner
    }
}
