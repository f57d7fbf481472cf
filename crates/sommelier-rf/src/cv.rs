//! K-fold cross-validation for random-forest regression.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::{info, instrument};

use crate::config::RandomForestConfig;
use crate::dataset::Dataset;
use crate::error::RfError;
use crate::eval::{EvaluationResult, RegressionMetrics};

/// Cross-validation configuration.
///
/// Construct via [`CrossValidation::new`], then chain `with_seed` if desired.
#[derive(Debug, Clone)]
pub struct CrossValidation {
    n_folds: usize,
    seed: u64,
}

/// Results of k-fold cross-validation.
#[derive(Debug)]
pub struct CrossValidationResult {
    /// Held-out metrics for each fold, in fold order.
    pub fold_results: Vec<EvaluationResult>,
    /// Per-dimension mean of the fold metrics. `n_examples` is the total
    /// number of held-out examples.
    pub mean_metrics: EvaluationResult,
    /// Number of folds.
    pub n_folds: usize,
    /// Total number of examples.
    pub n_examples: usize,
}

impl CrossValidation {
    /// Create a new cross-validation config with the given number of folds.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidFoldCount`] if `n_folds` < 2.
    pub fn new(n_folds: usize) -> Result<Self, RfError> {
        if n_folds < 2 {
            return Err(RfError::InvalidFoldCount { n_folds });
        }
        Ok(Self { n_folds, seed: 42 })
    }

    /// Set the random seed for fold shuffling.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the number of folds.
    #[must_use]
    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    /// Run k-fold cross-validation.
    ///
    /// Rows are shuffled with the fold seed and dealt round-robin into
    /// `n_folds` folds. Fold `k` trains on every other fold with seed
    /// `config.seed() + k` and is evaluated on itself.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::EmptyDataset`] | Zero examples |
    /// | [`RfError::TooFewExamplesForFolds`] | Fewer examples than folds |
    /// | Other RF errors | From underlying training or evaluation |
    #[instrument(skip_all, fields(n_folds = self.n_folds, n_examples = dataset.n_examples()))]
    pub fn evaluate(
        &self,
        config: &RandomForestConfig,
        dataset: &Dataset,
    ) -> Result<CrossValidationResult, RfError> {
        if dataset.is_empty() {
            return Err(RfError::EmptyDataset);
        }
        let n_examples = dataset.n_examples();
        if n_examples < self.n_folds {
            return Err(RfError::TooFewExamplesForFolds {
                n_examples,
                n_folds: self.n_folds,
            });
        }

        let mut order: Vec<usize> = (0..n_examples).collect();
        order.shuffle(&mut ChaCha8Rng::seed_from_u64(self.seed));

        let mut fold_results = Vec::with_capacity(self.n_folds);
        for fold in 0..self.n_folds {
            let (test_idx, train_idx): (Vec<usize>, Vec<usize>) = order
                .iter()
                .enumerate()
                .map(|(position, &row)| (position % self.n_folds == fold, row))
                .fold((Vec::new(), Vec::new()), |(mut test, mut train), (held_out, row)| {
                    if held_out {
                        test.push(row);
                    } else {
                        train.push(row);
                    }
                    (test, train)
                });

            let fold_config = config
                .clone()
                .with_seed(config.seed.wrapping_add(fold as u64));
            let result = fold_config.fit(&dataset.subset(&train_idx))?;
            let metrics = result.forest().evaluate(&dataset.subset(&test_idx))?;

            for (dimension, m) in metrics.iter() {
                info!(fold, dimension, mae = m.mae, rmse = m.rmse, r2 = m.r2, "fold completed");
            }
            fold_results.push(metrics);
        }

        let mean_metrics = mean_over_folds(&fold_results, n_examples);
        for (dimension, m) in mean_metrics.iter() {
            info!(dimension, mae = m.mae, rmse = m.rmse, r2 = m.r2, "cross-validation complete");
        }

        Ok(CrossValidationResult {
            fold_results,
            mean_metrics,
            n_folds: self.n_folds,
            n_examples,
        })
    }
}

/// Average each dimension's metrics over folds. A NaN R² in any fold makes
/// the mean R² NaN.
fn mean_over_folds(folds: &[EvaluationResult], n_examples: usize) -> EvaluationResult {
    let Some(first) = folds.first() else {
        return EvaluationResult::new(Vec::new());
    };
    let n = folds.len() as f64;
    let dimensions = first
        .dimensions()
        .iter()
        .enumerate()
        .map(|(d, (name, _))| {
            let (mae, rmse, r2) = folds.iter().fold((0.0, 0.0, 0.0), |(mae, rmse, r2), f| {
                let m = &f.dimensions()[d].1;
                (mae + m.mae, rmse + m.rmse, r2 + m.r2)
            });
            (
                name.clone(),
                RegressionMetrics {
                    mae: mae / n,
                    rmse: rmse / n,
                    r2: r2 / n,
                    n_examples,
                },
            )
        })
        .collect();
    EvaluationResult::new(dimensions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Example;

    fn linear_data(n: usize) -> Dataset {
        let examples: Vec<Example> = (0..n)
            .map(|i| {
                let x = i as f64;
                Example::new()
                    .with_feature("x", x)
                    .with_feature("noise", ((i * 7) % 11) as f64)
                    .with_target("y", 3.0 * x + 1.0)
            })
            .collect();
        Dataset::from_examples(&examples).unwrap()
    }

    #[test]
    fn five_fold_linear_signal() {
        let ds = linear_data(100);
        let config = RandomForestConfig::new(15).unwrap().with_seed(42);
        let result = CrossValidation::new(5)
            .unwrap()
            .with_seed(7)
            .evaluate(&config, &ds)
            .unwrap();
        assert_eq!(result.fold_results.len(), 5);
        assert_eq!(result.n_folds, 5);
        assert_eq!(result.n_examples, 100);
        let y = result.mean_metrics.get("y").unwrap();
        assert!(y.r2 > 0.9, "mean r2 = {}", y.r2);
        assert_eq!(y.n_examples, 100);
    }

    #[test]
    fn folds_cover_every_example_once() {
        let ds = linear_data(23);
        let config = RandomForestConfig::new(3).unwrap();
        let result = CrossValidation::new(4).unwrap().evaluate(&config, &ds).unwrap();
        let held_out: usize = result
            .fold_results
            .iter()
            .map(|f| f.get("y").unwrap().n_examples)
            .sum();
        assert_eq!(held_out, 23);
    }

    #[test]
    fn deterministic_for_fixed_seeds() {
        let ds = linear_data(40);
        let config = RandomForestConfig::new(4).unwrap();
        let cv = CrossValidation::new(3).unwrap().with_seed(11);
        let a = cv.evaluate(&config, &ds).unwrap();
        let b = cv.evaluate(&config, &ds).unwrap();
        assert_eq!(a.fold_results, b.fold_results);
    }

    #[test]
    fn invalid_fold_count() {
        assert!(matches!(
            CrossValidation::new(1).unwrap_err(),
            RfError::InvalidFoldCount { n_folds: 1 }
        ));
        assert!(CrossValidation::new(0).is_err());
    }

    #[test]
    fn too_few_examples_for_folds() {
        let ds = linear_data(3);
        let config = RandomForestConfig::new(2).unwrap();
        let err = CrossValidation::new(5).unwrap().evaluate(&config, &ds).unwrap_err();
        assert!(matches!(
            err,
            RfError::TooFewExamplesForFolds { n_examples: 3, n_folds: 5 }
        ));
    }
}
