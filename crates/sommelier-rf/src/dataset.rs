//! In-memory tabular datasets of named features and named regression targets.

use std::collections::{BTreeMap, HashSet};

use crate::error::RfError;

/// A single observation: named feature values plus named target values.
///
/// Keys are unique; inserting a name twice keeps the last value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Example {
    features: BTreeMap<String, f64>,
    targets: BTreeMap<String, f64>,
}

impl Example {
    /// Create an example with no features and no targets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a feature value.
    #[must_use]
    pub fn with_feature(mut self, name: impl Into<String>, value: f64) -> Self {
        self.features.insert(name.into(), value);
        self
    }

    /// Set a target value.
    #[must_use]
    pub fn with_target(mut self, name: impl Into<String>, value: f64) -> Self {
        self.targets.insert(name.into(), value);
        self
    }

    /// Return the value of the named feature, if present.
    #[must_use]
    pub fn feature(&self, name: &str) -> Option<f64> {
        self.features.get(name).copied()
    }

    /// Return the value of the named target, if present.
    #[must_use]
    pub fn target(&self, name: &str) -> Option<f64> {
        self.targets.get(name).copied()
    }

    /// Return all features, ordered by name.
    #[must_use]
    pub fn features(&self) -> &BTreeMap<String, f64> {
        &self.features
    }

    /// Return all targets, ordered by name.
    #[must_use]
    pub fn targets(&self) -> &BTreeMap<String, f64> {
        &self.targets
    }
}

/// An immutable, ordered collection of examples sharing one schema.
///
/// Storage is column-major: `columns[feature_idx][example_idx]` and
/// `targets[dimension_idx][example_idx]`. Feature names are kept sorted so
/// that a feature's index never depends on source column order. Example
/// order is preserved and drives seeded sampling.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    feature_names: Vec<String>,
    target_names: Vec<String>,
    columns: Vec<Vec<f64>>,
    targets: Vec<Vec<f64>>,
    n_examples: usize,
}

impl Dataset {
    /// Build a dataset from examples that all share the same feature and target names.
    ///
    /// Target dimensions are ordered by name.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::EmptyDataset`] | `examples` is empty |
    /// | [`RfError::ZeroFeatures`] | the first example has no features |
    /// | [`RfError::ZeroTargets`] | the first example has no targets |
    /// | [`RfError::DuplicateColumn`] | a name is both a feature and a target |
    /// | [`RfError::InconsistentFeatureSchema`] | an example's feature names differ from example 0 |
    /// | [`RfError::InconsistentTargetSchema`] | an example's target names differ from example 0 |
    /// | [`RfError::NonFiniteValue`] | any value is NaN or infinite |
    pub fn from_examples(examples: &[Example]) -> Result<Self, RfError> {
        let first = examples.first().ok_or(RfError::EmptyDataset)?;
        let feature_names: Vec<String> = first.features.keys().cloned().collect();
        let target_names: Vec<String> = first.targets.keys().cloned().collect();

        if feature_names.is_empty() {
            return Err(RfError::ZeroFeatures);
        }
        if target_names.is_empty() {
            return Err(RfError::ZeroTargets);
        }
        if let Some(name) = target_names.iter().find(|t| first.features.contains_key(*t)) {
            return Err(RfError::DuplicateColumn {
                column: name.clone(),
            });
        }

        let n_examples = examples.len();
        let mut columns = vec![Vec::with_capacity(n_examples); feature_names.len()];
        let mut targets = vec![Vec::with_capacity(n_examples); target_names.len()];

        for (example_index, example) in examples.iter().enumerate() {
            if !example.features.keys().eq(feature_names.iter()) {
                return Err(RfError::InconsistentFeatureSchema { example_index });
            }
            if !example.targets.keys().eq(target_names.iter()) {
                return Err(RfError::InconsistentTargetSchema { example_index });
            }
            for (column, (name, &value)) in columns.iter_mut().zip(&example.features) {
                check_finite(name, example_index, value)?;
                column.push(value);
            }
            for (column, (name, &value)) in targets.iter_mut().zip(&example.targets) {
                check_finite(name, example_index, value)?;
                column.push(value);
            }
        }

        Ok(Self {
            feature_names,
            target_names,
            columns,
            targets,
            n_examples,
        })
    }

    /// Build a dataset from named feature columns and named target columns.
    ///
    /// Feature columns are reordered by name; target dimensions keep the
    /// order given.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::ZeroFeatures`] | `features` is empty |
    /// | [`RfError::ZeroTargets`] | `targets` is empty |
    /// | [`RfError::DuplicateColumn`] | a column name repeats |
    /// | [`RfError::ColumnLengthMismatch`] | columns differ in length |
    /// | [`RfError::EmptyDataset`] | columns hold zero values |
    /// | [`RfError::NonFiniteValue`] | any value is NaN or infinite |
    pub fn from_columns(
        mut features: Vec<(String, Vec<f64>)>,
        targets: Vec<(String, Vec<f64>)>,
    ) -> Result<Self, RfError> {
        if features.is_empty() {
            return Err(RfError::ZeroFeatures);
        }
        if targets.is_empty() {
            return Err(RfError::ZeroTargets);
        }

        let mut seen = HashSet::new();
        for (name, _) in features.iter().chain(&targets) {
            if !seen.insert(name.as_str()) {
                return Err(RfError::DuplicateColumn {
                    column: name.clone(),
                });
            }
        }

        let n_examples = features[0].1.len();
        for (name, values) in features.iter().chain(&targets) {
            if values.len() != n_examples {
                return Err(RfError::ColumnLengthMismatch {
                    column: name.clone(),
                    expected: n_examples,
                    got: values.len(),
                });
            }
            for (example_index, &value) in values.iter().enumerate() {
                check_finite(name, example_index, value)?;
            }
        }
        if n_examples == 0 {
            return Err(RfError::EmptyDataset);
        }

        features.sort_by(|a, b| a.0.cmp(&b.0));
        let (feature_names, columns) = features.into_iter().unzip();
        let (target_names, targets) = targets.into_iter().unzip();

        Ok(Self {
            feature_names,
            target_names,
            columns,
            targets,
            n_examples,
        })
    }

    /// Return a dataset holding the given rows, in the given order.
    ///
    /// Unlike the public constructors this may produce an empty dataset.
    pub(crate) fn subset(&self, indices: &[usize]) -> Self {
        let pick = |col: &Vec<f64>| indices.iter().map(|&i| col[i]).collect::<Vec<f64>>();
        Self {
            feature_names: self.feature_names.clone(),
            target_names: self.target_names.clone(),
            columns: self.columns.iter().map(pick).collect(),
            targets: self.targets.iter().map(pick).collect(),
            n_examples: indices.len(),
        }
    }

    /// Return the number of examples.
    #[must_use]
    pub fn n_examples(&self) -> usize {
        self.n_examples
    }

    /// Return `true` if the dataset holds no examples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n_examples == 0
    }

    /// Return the number of feature columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Return the number of target dimensions.
    #[must_use]
    pub fn n_targets(&self) -> usize {
        self.target_names.len()
    }

    /// Return the feature names, sorted.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Return the target dimension names.
    #[must_use]
    pub fn target_names(&self) -> &[String] {
        &self.target_names
    }

    /// Return the position of a feature in the schema.
    #[must_use]
    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.feature_names
            .binary_search_by(|n| n.as_str().cmp(name))
            .ok()
    }

    /// Return the position of a target dimension.
    #[must_use]
    pub fn target_index(&self, name: &str) -> Option<usize> {
        self.target_names.iter().position(|t| t == name)
    }

    /// Return all values of one feature column.
    #[must_use]
    pub fn column(&self, feature_idx: usize) -> &[f64] {
        &self.columns[feature_idx]
    }

    /// Return all values of one target dimension.
    #[must_use]
    pub fn target_column(&self, dimension_idx: usize) -> &[f64] {
        &self.targets[dimension_idx]
    }

    /// Return the feature values of one example in schema order.
    #[must_use]
    pub fn row(&self, example_idx: usize) -> Vec<f64> {
        self.columns.iter().map(|col| col[example_idx]).collect()
    }

    /// Reconstruct one example as a named [`Example`].
    #[must_use]
    pub fn example(&self, example_idx: usize) -> Example {
        let features = self
            .feature_names
            .iter()
            .zip(&self.columns)
            .map(|(name, col)| (name.clone(), col[example_idx]))
            .collect();
        let targets = self
            .target_names
            .iter()
            .zip(&self.targets)
            .map(|(name, col)| (name.clone(), col[example_idx]))
            .collect();
        Example { features, targets }
    }

    pub(crate) fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }
}

fn check_finite(column: &str, example_index: usize, value: f64) -> Result<(), RfError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(RfError::NonFiniteValue {
            column: column.to_string(),
            example_index,
        })
    }
}
