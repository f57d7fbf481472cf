//! Configuration builder for random-forest regression training.

use crate::dataset::Dataset;
use crate::error::RfError;
use crate::result::RandomForestResult;
use crate::split::SplitCriterion;
use crate::tree::DecisionTreeConfig;

/// Whether to compute out-of-bag evaluation during training.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OobMode {
    /// Compute OOB MAE/RMSE/R² over the training rows.
    Enabled,
    /// Skip OOB evaluation.
    Disabled,
}

/// Configuration for random-forest training.
///
/// Construct via [`RandomForestConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter                 | Default            |
/// |---------------------------|--------------------|
/// | `criterion`               | `MeanSquaredError` |
/// | `max_depth`               | `None`             |
/// | `min_examples_per_split`  | 5                  |
/// | `min_impurity_decrease`   | 0.001              |
/// | `row_subsample_ratio`     | 0.7                |
/// | `feature_subsample_ratio` | 0.7                |
/// | `seed`                    | 12345              |
/// | `oob_mode`                | `Disabled`         |
#[derive(Debug, Clone, PartialEq)]
pub struct RandomForestConfig {
    pub(crate) n_trees: usize,
    pub(crate) criterion: SplitCriterion,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_examples_per_split: usize,
    pub(crate) min_impurity_decrease: f64,
    pub(crate) row_subsample_ratio: f64,
    pub(crate) feature_subsample_ratio: f64,
    pub(crate) seed: u64,
    pub(crate) oob_mode: OobMode,
}

impl RandomForestConfig {
    /// Create a new config with the given number of trees.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidTreeCount`] if `n_trees` is zero.
    pub fn new(n_trees: usize) -> Result<Self, RfError> {
        if n_trees == 0 {
            return Err(RfError::InvalidTreeCount { n_trees });
        }
        Ok(Self {
            n_trees,
            criterion: SplitCriterion::MeanSquaredError,
            max_depth: None,
            min_examples_per_split: 5,
            min_impurity_decrease: 0.001,
            row_subsample_ratio: 0.7,
            feature_subsample_ratio: 0.7,
            seed: 12345,
            oob_mode: OobMode::Disabled,
        })
    }

    // --- Setters ---

    /// Set the split quality criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the maximum tree depth. `None` means unlimited.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the minimum number of examples each side of a split must hold.
    #[must_use]
    pub fn with_min_examples_per_split(mut self, min_examples_per_split: usize) -> Self {
        self.min_examples_per_split = min_examples_per_split;
        self
    }

    /// Set the minimum impurity decrease a split must achieve.
    #[must_use]
    pub fn with_min_impurity_decrease(mut self, min_impurity_decrease: f64) -> Self {
        self.min_impurity_decrease = min_impurity_decrease;
        self
    }

    /// Set the fraction of training rows drawn (without replacement) per tree.
    #[must_use]
    pub fn with_row_subsample_ratio(mut self, row_subsample_ratio: f64) -> Self {
        self.row_subsample_ratio = row_subsample_ratio;
        self
    }

    /// Set the fraction of features sampled as split candidates at each node.
    #[must_use]
    pub fn with_feature_subsample_ratio(mut self, feature_subsample_ratio: f64) -> Self {
        self.feature_subsample_ratio = feature_subsample_ratio;
        self
    }

    /// Set the base seed every per-tree stream is derived from.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the OOB evaluation mode.
    #[must_use]
    pub fn with_oob_mode(mut self, oob_mode: OobMode) -> Self {
        self.oob_mode = oob_mode;
        self
    }

    // --- Getters ---

    /// Return the number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    /// Return the split criterion.
    #[must_use]
    pub fn criterion(&self) -> SplitCriterion {
        self.criterion
    }

    /// Return the maximum depth limit, if any.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return the minimum examples per split side.
    #[must_use]
    pub fn min_examples_per_split(&self) -> usize {
        self.min_examples_per_split
    }

    /// Return the minimum impurity decrease.
    #[must_use]
    pub fn min_impurity_decrease(&self) -> f64 {
        self.min_impurity_decrease
    }

    /// Return the row subsample ratio.
    #[must_use]
    pub fn row_subsample_ratio(&self) -> f64 {
        self.row_subsample_ratio
    }

    /// Return the feature subsample ratio.
    #[must_use]
    pub fn feature_subsample_ratio(&self) -> f64 {
        self.feature_subsample_ratio
    }

    /// Return the base seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Return the OOB evaluation mode.
    #[must_use]
    pub fn oob_mode(&self) -> OobMode {
        self.oob_mode
    }

    /// The per-tree configuration implied by this forest configuration.
    #[must_use]
    pub fn tree_config(&self) -> DecisionTreeConfig {
        DecisionTreeConfig::new()
            .with_criterion(self.criterion)
            .with_max_depth(self.max_depth)
            .with_min_examples_per_split(self.min_examples_per_split)
            .with_min_impurity_decrease(self.min_impurity_decrease)
            .with_feature_subsample_ratio(self.feature_subsample_ratio)
    }

    /// Number of rows drawn per tree: `round(ratio · n_examples)`, at least 1.
    #[must_use]
    pub fn bag_size(&self, n_examples: usize) -> usize {
        ((n_examples as f64 * self.row_subsample_ratio).round() as usize).clamp(1, n_examples.max(1))
    }

    /// Check every hyperparameter without touching data.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`RfError::InvalidTreeCount`] | `n_trees` is zero |
    /// | [`RfError::InvalidSubsampleRatio`] | `row_subsample_ratio` not in (0.0, 1.0] |
    /// | any tree-level error | see [`DecisionTreeConfig::validate`] |
    pub fn validate(&self) -> Result<(), RfError> {
        if self.n_trees == 0 {
            return Err(RfError::InvalidTreeCount { n_trees: 0 });
        }
        if !(self.row_subsample_ratio > 0.0 && self.row_subsample_ratio <= 1.0) {
            return Err(RfError::InvalidSubsampleRatio {
                name: "row_subsample_ratio",
                ratio: self.row_subsample_ratio,
            });
        }
        self.tree_config().validate()
    }

    /// Train a random forest on `dataset`.
    ///
    /// # Errors
    ///
    /// | Variant                          | When                                          |
    /// |----------------------------------|-----------------------------------------------|
    /// | any ConfigError                  | see [`validate`](Self::validate)              |
    /// | [`RfError::EmptyDataset`]        | `dataset` holds no examples                   |
    /// | [`RfError::OobEvaluationFailed`] | OOB enabled but no row has any OOB tree       |
    pub fn fit(&self, dataset: &Dataset) -> Result<RandomForestResult, RfError> {
        crate::forest::train(self, dataset)
    }
}
