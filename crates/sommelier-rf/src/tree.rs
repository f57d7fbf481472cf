use rand::Rng;
use tracing::{debug, instrument};

use crate::{
    RfError,
    dataset::{Dataset, Example},
    node::Node,
    split::{SplitCriterion, find_best_split},
};

/// Impurity at or below this value counts as a pure node.
const PURE_TOLERANCE: f64 = 1e-12;

/// Configuration for a single CART regression tree.
///
/// Construct via [`DecisionTreeConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter                 | Default             |
/// |---------------------------|---------------------|
/// | `criterion`               | `MeanSquaredError`  |
/// | `max_depth`               | `None` (unlimited)  |
/// | `min_examples_per_split`  | 5                   |
/// | `min_impurity_decrease`   | 0.0                 |
/// | `feature_subsample_ratio` | 1.0                 |
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTreeConfig {
    pub(crate) criterion: SplitCriterion,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_examples_per_split: usize,
    pub(crate) min_impurity_decrease: f64,
    pub(crate) feature_subsample_ratio: f64,
}

impl DecisionTreeConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            criterion: SplitCriterion::MeanSquaredError,
            max_depth: None,
            min_examples_per_split: 5,
            min_impurity_decrease: 0.0,
            feature_subsample_ratio: 1.0,
        }
    }

    /// Set the split quality criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the maximum tree depth.
    ///
    /// `None` grows until a stopping rule fires. `Some(d)` turns every node
    /// at depth `d` into a leaf (the root is depth 0).
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the minimum number of examples each side of a split must hold.
    ///
    /// Nodes with fewer than twice this many examples become leaves.
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

    /// Set the fraction of features sampled as split candidates at each node.
    #[must_use]
    pub fn with_feature_subsample_ratio(mut self, feature_subsample_ratio: f64) -> Self {
        self.feature_subsample_ratio = feature_subsample_ratio;
        self
    }

    // --- Getters ---

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

    /// Return the feature subsample ratio.
    #[must_use]
    pub fn feature_subsample_ratio(&self) -> f64 {
        self.feature_subsample_ratio
    }

    /// Number of candidate features per node: `floor(ratio · n_features)`, at least 1.
    #[must_use]
    pub fn n_candidate_features(&self, n_features: usize) -> usize {
        ((n_features as f64 * self.feature_subsample_ratio).floor() as usize).clamp(1, n_features.max(1))
    }

    /// Check every hyperparameter.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`RfError::InvalidMaxDepth`] | `max_depth` is `Some(0)` |
    /// | [`RfError::InvalidMinExamplesPerSplit`] | `min_examples_per_split` is 0 |
    /// | [`RfError::InvalidMinImpurityDecrease`] | negative or non-finite |
    /// | [`RfError::InvalidSubsampleRatio`] | `feature_subsample_ratio` not in (0.0, 1.0] |
    pub fn validate(&self) -> Result<(), RfError> {
        if let Some(d) = self.max_depth
            && d == 0
        {
            return Err(RfError::InvalidMaxDepth { max_depth: 0 });
        }
        if self.min_examples_per_split == 0 {
            return Err(RfError::InvalidMinExamplesPerSplit {
                min_examples_per_split: 0,
            });
        }
        if !self.min_impurity_decrease.is_finite() || self.min_impurity_decrease < 0.0 {
            return Err(RfError::InvalidMinImpurityDecrease {
                value: self.min_impurity_decrease,
            });
        }
        if !(self.feature_subsample_ratio > 0.0 && self.feature_subsample_ratio <= 1.0) {
            return Err(RfError::InvalidSubsampleRatio {
                name: "feature_subsample_ratio",
                ratio: self.feature_subsample_ratio,
            });
        }
        Ok(())
    }

    /// Grow a tree on every example of `dataset`.
    ///
    /// `rng` drives feature subsampling only.
    ///
    /// # Errors
    ///
    /// Any error from [`validate`](Self::validate), or [`RfError::EmptyBag`]
    /// when `dataset` holds no examples.
    pub fn fit(&self, dataset: &Dataset, rng: &mut impl Rng) -> Result<DecisionTree, RfError> {
        let all: Vec<usize> = (0..dataset.n_examples()).collect();
        self.fit_bag(dataset, &all, rng)
    }

    /// Grow a tree on the rows of `dataset` listed in `bag`.
    ///
    /// One root is grown per target dimension, in dimension order, all from
    /// the same bag and the same `rng` stream.
    #[instrument(skip_all, fields(bag_size = bag.len()))]
    pub(crate) fn fit_bag(
        &self,
        dataset: &Dataset,
        bag: &[usize],
        rng: &mut impl Rng,
    ) -> Result<DecisionTree, RfError> {
        self.validate()?;
        if bag.is_empty() {
            return Err(RfError::EmptyBag);
        }

        let n_candidates = self.n_candidate_features(dataset.n_features());
        let roots: Vec<Node> = (0..dataset.n_targets())
            .map(|dim| {
                build_node(
                    dataset.columns(),
                    dataset.target_column(dim),
                    bag,
                    self,
                    n_candidates,
                    0,
                    rng,
                )
            })
            .collect();

        let tree = DecisionTree {
            roots,
            feature_names: dataset.feature_names().to_vec(),
        };

        debug!(
            n_nodes = tree.n_nodes(),
            depth = tree.depth(),
            n_candidates,
            "decision tree built"
        );

        Ok(tree)
    }
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Recursively grow the subtree for the examples in `indices`.
fn build_node(
    columns: &[Vec<f64>],
    targets: &[f64],
    indices: &[usize],
    config: &DecisionTreeConfig,
    n_candidates: usize,
    depth: usize,
    rng: &mut impl Rng,
) -> Node {
    let n_examples = indices.len();
    let (mean, impurity) = config.criterion.node_stats(targets, indices);
    let leaf = || Node::Leaf {
        value: mean,
        impurity,
        n_examples,
    };

    let too_few = n_examples < config.min_examples_per_split.saturating_mul(2);
    let depth_reached = config.max_depth.is_some_and(|max_d| depth >= max_d);
    let pure = impurity.value() <= PURE_TOLERANCE;
    if too_few || depth_reached || pure {
        return leaf();
    }

    let Some(split) = find_best_split(
        columns,
        targets,
        indices,
        mean,
        impurity,
        config.criterion,
        n_candidates,
        config.min_examples_per_split,
        rng,
    ) else {
        return leaf();
    };

    if split.impurity_decrease < config.min_impurity_decrease {
        return leaf();
    }

    let left = build_node(
        columns,
        targets,
        &split.left_indices,
        config,
        n_candidates,
        depth + 1,
        rng,
    );
    let right = build_node(
        columns,
        targets,
        &split.right_indices,
        config,
        n_candidates,
        depth + 1,
        rng,
    );

    Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left: Box::new(left),
        right: Box::new(right),
        impurity,
        n_examples,
        impurity_decrease: split.impurity_decrease,
    }
}

/// A fitted CART regression tree.
///
/// Holds one root per output dimension plus the feature schema it was
/// trained against.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DecisionTree {
    pub(crate) roots: Vec<Node>,
    pub(crate) feature_names: Vec<String>,
}

impl DecisionTree {
    /// Predict every output dimension for a named example.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::MissingFeature`] when a split on the walked path
    /// tests a feature the example lacks.
    pub fn predict(&self, example: &Example) -> Result<Vec<f64>, RfError> {
        let sample: Vec<Option<f64>> = self
            .feature_names
            .iter()
            .map(|name| example.feature(name))
            .collect();
        self.predict_aligned(&sample)
    }

    /// Predict from feature values already laid out in schema order.
    pub(crate) fn predict_aligned(&self, sample: &[Option<f64>]) -> Result<Vec<f64>, RfError> {
        self.roots
            .iter()
            .map(|root| self.walk(root, sample))
            .collect()
    }

    /// Walk from `root` to a leaf and return the leaf value.
    ///
    /// Goes left when `sample[feature] <= threshold`, right otherwise.
    fn walk(&self, root: &Node, sample: &[Option<f64>]) -> Result<f64, RfError> {
        let mut node = root;
        loop {
            match node {
                Node::Leaf { value, .. } => return Ok(*value),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    let x = sample
                        .get(feature.index())
                        .copied()
                        .flatten()
                        .ok_or_else(|| RfError::MissingFeature {
                            feature: self
                                .feature_names
                                .get(feature.index())
                                .cloned()
                                .unwrap_or_else(|| format!("#{feature}")),
                        })?;
                    node = if x <= *threshold {
                        left.as_ref()
                    } else {
                        right.as_ref()
                    };
                }
            }
        }
    }

    /// Return the root of each output dimension.
    #[must_use]
    pub fn roots(&self) -> &[Node] {
        &self.roots
    }

    /// Return the number of output dimensions.
    #[must_use]
    pub fn n_dimensions(&self) -> usize {
        self.roots.len()
    }

    /// Return the feature schema.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Return the number of features in the schema.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Return the total number of nodes across all roots.
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.roots.iter().map(Node::n_nodes).sum()
    }

    /// Return the total number of leaves across all roots.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.roots.iter().map(Node::n_leaves).sum()
    }

    /// Return the maximum depth over all roots.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.roots.iter().map(Node::depth).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    /// y is a step function of x; z is noise.
    fn step_dataset(n: usize) -> Dataset {
        let mut noise = ChaCha8Rng::seed_from_u64(7);
        let examples: Vec<Example> = (0..n)
            .map(|i| {
                let x = i as f64;
                let y = if x < n as f64 / 2.0 { 3.0 } else { 7.0 };
                Example::new()
                    .with_feature("x", x)
                    .with_feature("z", noise.gen_range(0.0..1.0))
                    .with_target("y", y)
            })
            .collect();
        Dataset::from_examples(&examples).unwrap()
    }

    fn noisy_dataset(n: usize, seed: u64) -> Dataset {
        let mut r = ChaCha8Rng::seed_from_u64(seed);
        let examples: Vec<Example> = (0..n)
            .map(|_| {
                let a: f64 = r.gen_range(0.0..10.0);
                let b: f64 = r.gen_range(0.0..1.0);
                Example::new()
                    .with_feature("a", a)
                    .with_feature("b", b)
                    .with_feature("c", r.gen_range(-1.0..1.0))
                    .with_target("y", a * 0.5 + b * 2.0 + r.gen_range(0.0..0.3))
            })
            .collect();
        Dataset::from_examples(&examples).unwrap()
    }

    fn visit<'a>(node: &'a Node, depth: usize, out: &mut Vec<(&'a Node, usize)>) {
        out.push((node, depth));
        if let Node::Split { left, right, .. } = node {
            visit(left, depth + 1, out);
            visit(right, depth + 1, out);
        }
    }

    fn all_nodes(tree: &DecisionTree) -> Vec<(&Node, usize)> {
        let mut out = Vec::new();
        for root in tree.roots() {
            visit(root, 0, &mut out);
        }
        out
    }

    #[test]
    fn empty_bag_error() {
        let ds = step_dataset(10);
        let err = DecisionTreeConfig::new()
            .fit_bag(&ds, &[], &mut rng())
            .unwrap_err();
        assert!(matches!(err, RfError::EmptyBag));
    }

    #[test]
    fn constant_target_single_leaf() {
        let examples: Vec<Example> = (0..20)
            .map(|i| Example::new().with_feature("x", i as f64).with_target("y", 5.0))
            .collect();
        let ds = Dataset::from_examples(&examples).unwrap();
        let tree = DecisionTreeConfig::new().fit(&ds, &mut rng()).unwrap();
        assert_eq!(tree.n_nodes(), 1);
        let pred = tree.predict(&Example::new().with_feature("x", 3.0)).unwrap();
        assert_eq!(pred, vec![5.0]);
    }

    #[test]
    fn step_function_learned() {
        let ds = step_dataset(40);
        let tree = DecisionTreeConfig::new()
            .with_min_examples_per_split(2)
            .fit(&ds, &mut rng())
            .unwrap();
        let low = Example::new().with_feature("x", 4.0).with_feature("z", 0.5);
        let high = Example::new().with_feature("x", 35.0).with_feature("z", 0.5);
        assert!((tree.predict(&low).unwrap()[0] - 3.0).abs() < 1e-12);
        assert!((tree.predict(&high).unwrap()[0] - 7.0).abs() < 1e-12);
    }

    #[test]
    fn small_bag_becomes_root_leaf_with_mean() {
        let ds = step_dataset(40);
        // 9 examples < 2 * 5
        let bag = [0, 1, 2, 3, 4, 30, 31, 32, 33];
        let tree = DecisionTreeConfig::new().fit_bag(&ds, &bag, &mut rng()).unwrap();
        assert_eq!(tree.n_nodes(), 1);
        match &tree.roots()[0] {
            Node::Leaf { value, n_examples, .. } => {
                assert_eq!(*n_examples, 9);
                assert!((value - (5.0 * 3.0 + 4.0 * 7.0) / 9.0).abs() < 1e-12);
            }
            Node::Split { .. } => panic!("expected a leaf"),
        }
    }

    #[test]
    fn leaves_respect_min_examples() {
        let ds = noisy_dataset(300, 1);
        for min in [1, 3, 5, 12] {
            let tree = DecisionTreeConfig::new()
                .with_min_examples_per_split(min)
                .fit(&ds, &mut rng())
                .unwrap();
            for (node, _) in all_nodes(&tree) {
                if node.is_leaf() {
                    assert!(node.n_examples() >= min, "leaf with {} < {min}", node.n_examples());
                }
            }
        }
    }

    #[test]
    fn splits_never_increase_weighted_impurity() {
        let ds = noisy_dataset(300, 2);
        let tree = DecisionTreeConfig::new()
            .with_min_examples_per_split(2)
            .with_feature_subsample_ratio(0.7)
            .fit(&ds, &mut rng())
            .unwrap();
        for (node, _) in all_nodes(&tree) {
            if let Node::Split {
                left,
                right,
                impurity,
                n_examples,
                ..
            } = node
            {
                assert_eq!(left.n_examples() + right.n_examples(), *n_examples);
                let n = *n_examples as f64;
                let weighted = left.n_examples() as f64 / n * left.impurity().value()
                    + right.n_examples() as f64 / n * right.impurity().value();
                assert!(impurity.value() + 1e-9 >= weighted);
            }
        }
    }

    #[test]
    fn max_depth_limits_tree() {
        let ds = noisy_dataset(200, 3);
        let tree = DecisionTreeConfig::new()
            .with_max_depth(Some(3))
            .with_min_examples_per_split(1)
            .fit(&ds, &mut rng())
            .unwrap();
        assert!(tree.depth() <= 3);
    }

    #[test]
    fn high_min_impurity_decrease_yields_stump() {
        let ds = noisy_dataset(100, 4);
        let tree = DecisionTreeConfig::new()
            .with_min_impurity_decrease(1e9)
            .fit(&ds, &mut rng())
            .unwrap();
        assert_eq!(tree.n_nodes(), 1);
    }

    #[test]
    fn deterministic_with_same_rng_seed() {
        let ds = noisy_dataset(150, 5);
        let config = DecisionTreeConfig::new().with_feature_subsample_ratio(0.5);
        let a = config.fit(&ds, &mut ChaCha8Rng::seed_from_u64(9)).unwrap();
        let b = config.fit(&ds, &mut ChaCha8Rng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn one_root_per_target_dimension() {
        let examples: Vec<Example> = (0..30)
            .map(|i| {
                let x = i as f64;
                Example::new()
                    .with_feature("x", x)
                    .with_target("double", 2.0 * x)
                    .with_target("negated", -x)
            })
            .collect();
        let ds = Dataset::from_examples(&examples).unwrap();
        let tree = DecisionTreeConfig::new()
            .with_min_examples_per_split(1)
            .fit(&ds, &mut rng())
            .unwrap();
        assert_eq!(tree.n_dimensions(), 2);
        let pred = tree.predict(&Example::new().with_feature("x", 10.0)).unwrap();
        assert!((pred[0] - 20.0).abs() < 1e-9);
        assert!((pred[1] + 10.0).abs() < 1e-9);
    }

    #[test]
    fn missing_feature_on_path_errors() {
        let ds = step_dataset(40);
        let tree = DecisionTreeConfig::new()
            .with_min_examples_per_split(2)
            .fit(&ds, &mut rng())
            .unwrap();
        let err = tree
            .predict(&Example::new().with_feature("z", 0.1))
            .unwrap_err();
        assert!(matches!(err, RfError::MissingFeature { ref feature } if feature == "x"));
    }

    #[test]
    fn invalid_config_errors() {
        let ds = step_dataset(10);
        let cases = [
            DecisionTreeConfig::new().with_max_depth(Some(0)),
            DecisionTreeConfig::new().with_min_examples_per_split(0),
            DecisionTreeConfig::new().with_min_impurity_decrease(-0.1),
            DecisionTreeConfig::new().with_min_impurity_decrease(f64::NAN),
            DecisionTreeConfig::new().with_feature_subsample_ratio(0.0),
            DecisionTreeConfig::new().with_feature_subsample_ratio(1.5),
        ];
        for config in cases {
            let err = config.fit(&ds, &mut rng()).unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::Config, "{config:?}");
        }
    }

    #[test]
    fn candidate_count_floors_and_clamps() {
        let config = DecisionTreeConfig::new().with_feature_subsample_ratio(0.7);
        assert_eq!(config.n_candidate_features(11), 7);
        assert_eq!(config.n_candidate_features(1), 1);
        let tiny = DecisionTreeConfig::new().with_feature_subsample_ratio(0.01);
        assert_eq!(tiny.n_candidate_features(11), 1);
    }
}
