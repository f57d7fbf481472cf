//! What `RandomForestConfig::fit` hands back besides the forest itself.

use crate::forest::RandomForest;
use crate::oob::OobScore;

/// Shape of a completed training run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TrainingMetadata {
    /// Trees in the forest.
    pub n_trees: usize,
    /// Number of features in the schema.
    pub n_features: usize,
    /// Number of output dimensions.
    pub n_dimensions: usize,
    /// Number of training examples.
    pub n_examples: usize,
    /// Rows drawn (without replacement) per tree.
    pub bag_size: usize,
    /// Candidate features examined per node.
    pub n_candidate_features: usize,
}

/// A trained forest together with its out-of-bag bookkeeping.
///
/// `oob_indices_per_tree[i]` lists the training rows tree `i` never saw,
/// ascending. They are recorded even when [`OobMode`](crate::OobMode) is
/// disabled.
#[derive(Debug)]
pub struct RandomForestResult {
    forest: RandomForest,
    oob_score: Option<OobScore>,
    oob_indices_per_tree: Vec<Vec<usize>>,
    metadata: TrainingMetadata,
}

impl RandomForestResult {
    pub(crate) fn new(
        forest: RandomForest,
        oob_score: Option<OobScore>,
        oob_indices_per_tree: Vec<Vec<usize>>,
        metadata: TrainingMetadata,
    ) -> Self {
        Self {
            forest,
            oob_score,
            oob_indices_per_tree,
            metadata,
        }
    }

    /// The trained forest.
    #[must_use]
    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    /// Drop the bookkeeping and keep only the forest.
    #[must_use]
    pub fn into_forest(self) -> RandomForest {
        self.forest
    }

    /// Out-of-bag metrics; `None` unless OOB evaluation was enabled.
    #[must_use]
    pub fn oob_score(&self) -> Option<&OobScore> {
        self.oob_score.as_ref()
    }

    /// Sizes used during training.
    #[must_use]
    pub fn metadata(&self) -> &TrainingMetadata {
        &self.metadata
    }

    /// Rows excluded from each tree's bag, in tree order.
    #[must_use]
    pub fn oob_indices_per_tree(&self) -> &[Vec<usize>] {
        &self.oob_indices_per_tree
    }
}
