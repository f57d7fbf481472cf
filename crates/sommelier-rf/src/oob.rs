//! Out-of-bag (OOB) evaluation for the random forest.

use crate::dataset::Dataset;
use crate::error::RfError;
use crate::eval::{EvaluationResult, regression_metrics};
use crate::predict::Combiner;
use crate::tree::DecisionTree;

/// Out-of-bag evaluation result.
#[derive(Debug, Clone)]
pub struct OobScore {
    /// Per-dimension MAE/RMSE/R² over the covered training rows.
    pub metrics: EvaluationResult,
    /// Number of training rows that had at least one OOB tree.
    pub n_oob_examples: usize,
}

/// Compute out-of-bag predictions and metrics.
///
/// Each training row is predicted by averaging only the trees whose bag
/// excluded it. Rows with no such tree are skipped.
pub(crate) fn compute_oob(
    trees: &[DecisionTree],
    dataset: &Dataset,
    oob_indices_per_tree: &[Vec<usize>],
) -> Result<OobScore, RfError> {
    let n_examples = dataset.n_examples();
    let n_dimensions = dataset.n_targets();

    let mut per_row: Vec<Vec<Vec<f64>>> = vec![Vec::new(); n_examples];
    for (tree, oob_indices) in trees.iter().zip(oob_indices_per_tree) {
        for &row in oob_indices {
            let sample: Vec<Option<f64>> = dataset.row(row).into_iter().map(Some).collect();
            per_row[row].push(tree.predict_aligned(&sample)?);
        }
    }

    let covered: Vec<usize> = (0..n_examples).filter(|&i| !per_row[i].is_empty()).collect();
    let n_oob_examples = covered.len();
    if n_oob_examples == 0 {
        return Err(RfError::OobEvaluationFailed {
            reason: "no training example was left out of any tree's bag".to_string(),
        });
    }

    let predictions: Vec<Vec<f64>> = covered
        .iter()
        .map(|&i| Combiner::Averaging.combine(&per_row[i], n_dimensions))
        .collect();

    let dimensions = dataset
        .target_names()
        .iter()
        .enumerate()
        .map(|(d, name)| {
            let predicted: Vec<f64> = predictions.iter().map(|p| p[d]).collect();
            let targets = dataset.target_column(d);
            let actual: Vec<f64> = covered.iter().map(|&i| targets[i]).collect();
            (name.clone(), regression_metrics(&predicted, &actual))
        })
        .collect();

    Ok(OobScore {
        metrics: EvaluationResult::new(dimensions),
        n_oob_examples,
    })
}
