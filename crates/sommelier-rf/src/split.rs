use rand::Rng;

use crate::node::{FeatureIndex, Impurity};

/// Criterion for measuring the quality of a regression split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SplitCriterion {
    /// Mean squared error around the node mean: Σ(y - ȳ)² / n
    #[default]
    MeanSquaredError,
}

impl SplitCriterion {
    /// Compute the mean and impurity of the targets selected by `indices`.
    ///
    /// Two-pass and in double precision. Returns `(0.0, 0.0)` for an empty selection.
    #[must_use]
    pub fn node_stats(&self, targets: &[f64], indices: &[usize]) -> (f64, Impurity) {
        if indices.is_empty() {
            return (0.0, Impurity::new(0.0));
        }
        let n = indices.len() as f64;
        let mean = indices.iter().map(|&i| targets[i]).sum::<f64>() / n;
        let value = match self {
            SplitCriterion::MeanSquaredError => {
                indices
                    .iter()
                    .map(|&i| {
                        let d = targets[i] - mean;
                        d * d
                    })
                    .sum::<f64>()
                    / n
            }
        };
        (mean, Impurity::new(value))
    }

    /// Compute impurity from running sums of (shifted) target values.
    ///
    /// Used by the incremental split scan. The result is clamped at zero to
    /// absorb cancellation error.
    #[must_use]
    pub fn impurity_from_sums(&self, n: usize, sum: f64, sum_sq: f64) -> Impurity {
        if n == 0 {
            return Impurity::new(0.0);
        }
        let n = n as f64;
        let value = match self {
            SplitCriterion::MeanSquaredError => {
                let mean = sum / n;
                (sum_sq / n - mean * mean).max(0.0)
            }
        };
        Impurity::new(value)
    }
}

/// Result of finding the best split for a node.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    /// Feature used for the split.
    pub(crate) feature: FeatureIndex,
    /// Threshold value.
    pub(crate) threshold: f64,
    /// `impurity(parent) - (n_left/n)·impurity(left) - (n_right/n)·impurity(right)`.
    pub(crate) impurity_decrease: f64,
    /// Example indices going to the left child.
    pub(crate) left_indices: Vec<usize>,
    /// Example indices going to the right child.
    pub(crate) right_indices: Vec<usize>,
}

/// Find the best split among a random subset of features.
///
/// Draws `n_candidates` distinct features with a partial Fisher-Yates
/// shuffle, then visits them in ascending index order. Each candidate's
/// `(value, target)` pairs are sorted and scanned left-to-right with running
/// sums; thresholds sit at the midpoint between consecutive distinct values.
/// Only strictly better decreases replace the incumbent, so ties go to the
/// lowest feature index and then the smallest threshold.
///
/// Returns `None` when no admissible threshold exists (constant features, or
/// every boundary leaves a side with fewer than `min_examples` examples).
///
/// `columns` is column-major: `columns[feature_idx][example_idx]`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn find_best_split(
    columns: &[Vec<f64>],
    targets: &[f64],
    indices: &[usize],
    parent_mean: f64,
    parent_impurity: Impurity,
    criterion: SplitCriterion,
    n_candidates: usize,
    min_examples: usize,
    rng: &mut impl Rng,
) -> Option<SplitResult> {
    let n_features = columns.len();
    let n = indices.len();
    if n < 2 || n_features == 0 {
        return None;
    }

    let mut feature_order: Vec<usize> = (0..n_features).collect();
    let take = n_candidates.clamp(1, n_features);
    for i in 0..take {
        let j = rng.gen_range(i..n_features);
        feature_order.swap(i, j);
    }
    let mut candidates = feature_order[..take].to_vec();
    candidates.sort_unstable();

    // Targets are shifted by the parent mean to keep the running sums small.
    let (total_sum, total_sq) = indices.iter().fold((0.0f64, 0.0f64), |(s, q), &i| {
        let d = targets[i] - parent_mean;
        (s + d, q + d * d)
    });
    let n_total = n as f64;

    let mut best: Option<(FeatureIndex, f64, f64)> = None;
    let mut sorted: Vec<(f64, f64)> = Vec::with_capacity(n);

    for &feat_idx in &candidates {
        let col = &columns[feat_idx];
        sorted.clear();
        sorted.extend(indices.iter().map(|&i| (col[i], targets[i] - parent_mean)));
        sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_sum = 0.0f64;
        let mut left_sq = 0.0f64;

        for i in 0..(n - 1) {
            let (value, d) = sorted[i];
            left_sum += d;
            left_sq += d * d;

            let next = sorted[i + 1].0;
            if value == next {
                continue;
            }

            let n_left = i + 1;
            let n_right = n - n_left;
            if n_left < min_examples || n_right < min_examples {
                continue;
            }

            let left_impurity = criterion.impurity_from_sums(n_left, left_sum, left_sq);
            let right_impurity =
                criterion.impurity_from_sums(n_right, total_sum - left_sum, total_sq - left_sq);
            let decrease = parent_impurity.value()
                - (n_left as f64 / n_total) * left_impurity.value()
                - (n_right as f64 / n_total) * right_impurity.value();

            if best.is_none_or(|(_, _, best_decrease)| decrease > best_decrease) {
                // Keep value <= threshold < next even when the midpoint rounds up.
                let midpoint = value / 2.0 + next / 2.0;
                let threshold = if midpoint < next { midpoint } else { value };
                best = Some((FeatureIndex::new(feat_idx), threshold, decrease));
            }
        }
    }

    let (feature, threshold, impurity_decrease) = best?;

    let col = &columns[feature.index()];
    let (left_indices, right_indices): (Vec<usize>, Vec<usize>) =
        indices.iter().partition(|&&i| col[i] <= threshold);

    Some(SplitResult {
        feature,
        threshold,
        impurity_decrease,
        left_indices,
        right_indices,
    })
}
