//! Random-forest training with parallel tree construction.

use rand::SeedableRng;
use rand::seq::index;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::config::{OobMode, RandomForestConfig};
use crate::dataset::Dataset;
use crate::error::RfError;
use crate::oob::compute_oob;
use crate::predict::Combiner;
use crate::result::{RandomForestResult, TrainingMetadata};
use crate::tree::DecisionTree;

/// A fitted random-forest regression model.
///
/// Trees are stored in index order and never change after training.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RandomForest {
    pub(crate) trees: Vec<DecisionTree>,
    pub(crate) combiner: Combiner,
    pub(crate) feature_names: Vec<String>,
    pub(crate) target_names: Vec<String>,
}

/// The random stream for tree `tree_index`.
///
/// The ChaCha key comes from `base_seed` and the stream id is the tree index,
/// so each tree's randomness is independent of scheduling.
pub(crate) fn tree_rng(base_seed: u64, tree_index: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(base_seed);
    rng.set_stream(tree_index as u64);
    rng
}

/// Draw `bag_size` distinct rows out of `n_examples` and return the sorted bag
/// together with the out-of-bag complement.
fn draw_bag(n_examples: usize, bag_size: usize, rng: &mut ChaCha8Rng) -> (Vec<usize>, Vec<usize>) {
    let mut bag = index::sample(rng, n_examples, bag_size).into_vec();
    bag.sort_unstable();

    let mut in_bag = vec![false; n_examples];
    for &i in &bag {
        in_bag[i] = true;
    }
    let oob: Vec<usize> = (0..n_examples).filter(|&i| !in_bag[i]).collect();
    (bag, oob)
}

/// Train the random-forest ensemble.
#[instrument(skip_all, fields(n_trees = config.n_trees, n_examples = dataset.n_examples()))]
pub(crate) fn train(
    config: &RandomForestConfig,
    dataset: &Dataset,
) -> Result<RandomForestResult, RfError> {
    config.validate()?;
    if dataset.is_empty() {
        return Err(RfError::EmptyDataset);
    }

    let n_examples = dataset.n_examples();
    let n_features = dataset.n_features();
    let n_dimensions = dataset.n_targets();
    let bag_size = config.bag_size(n_examples);
    let tree_config = config.tree_config();
    let n_candidate_features = tree_config.n_candidate_features(n_features);
    let base_seed = config.seed;

    info!(
        n_trees = config.n_trees,
        n_examples,
        n_features,
        n_dimensions,
        bag_size,
        n_candidate_features,
        "training random forest"
    );

    // Indexed parallel collect keeps tree order regardless of completion order.
    let built: Vec<(DecisionTree, Vec<usize>)> = (0..config.n_trees)
        .into_par_iter()
        .map(|tree_index| {
            let mut rng = tree_rng(base_seed, tree_index);
            let (bag, oob) = draw_bag(n_examples, bag_size, &mut rng);
            let tree = tree_config.fit_bag(dataset, &bag, &mut rng)?;
            Ok::<_, RfError>((tree, oob))
        })
        .collect::<Result<_, _>>()?;

    let (trees, oob_indices_per_tree): (Vec<DecisionTree>, Vec<Vec<usize>>) =
        built.into_iter().unzip();

    for (tree_index, tree) in trees.iter().enumerate() {
        debug!(
            tree = tree_index,
            n_nodes = tree.n_nodes(),
            depth = tree.depth(),
            "tree assembled"
        );
    }

    let oob_score = match config.oob_mode {
        OobMode::Enabled => Some(compute_oob(&trees, dataset, &oob_indices_per_tree)?),
        OobMode::Disabled => None,
    };

    let forest = RandomForest {
        trees,
        combiner: Combiner::Averaging,
        feature_names: dataset.feature_names().to_vec(),
        target_names: dataset.target_names().to_vec(),
    };

    let metadata = TrainingMetadata {
        n_trees: config.n_trees,
        n_features,
        n_dimensions,
        n_examples,
        bag_size,
        n_candidate_features,
    };

    info!(
        oob_examples = oob_score.as_ref().map(|s| s.n_oob_examples),
        "random forest training complete"
    );

    Ok(RandomForestResult::new(
        forest,
        oob_score,
        oob_indices_per_tree,
        metadata,
    ))
}
