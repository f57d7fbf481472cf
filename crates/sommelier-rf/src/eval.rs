//! Regression metrics (MAE, RMSE, R²) for a fitted forest on held-out data.

use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{info, instrument};

use crate::dataset::Dataset;
use crate::error::RfError;
use crate::forest::RandomForest;

/// Error metrics for one output dimension.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct RegressionMetrics {
    /// Mean absolute error: `mean(|p - a|)`.
    pub mae: f64,
    /// Root mean squared error: `sqrt(mean((p - a)²))`.
    pub rmse: f64,
    /// Coefficient of determination: `1 - SS_res / SS_tot`.
    ///
    /// NaN when every actual value is the same.
    pub r2: f64,
    /// Number of examples the metrics were computed over.
    pub n_examples: usize,
}

/// Per-dimension metrics, in the model's dimension order.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    dimensions: Vec<(String, RegressionMetrics)>,
}

impl EvaluationResult {
    pub(crate) fn new(dimensions: Vec<(String, RegressionMetrics)>) -> Self {
        Self { dimensions }
    }

    /// Return the metrics for a named dimension.
    #[must_use]
    pub fn get(&self, dimension: &str) -> Option<&RegressionMetrics> {
        self.dimensions
            .iter()
            .find(|(name, _)| name == dimension)
            .map(|(_, m)| m)
    }

    /// Return all `(dimension, metrics)` pairs.
    #[must_use]
    pub fn dimensions(&self) -> &[(String, RegressionMetrics)] {
        &self.dimensions
    }

    /// Iterate over `(dimension, metrics)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RegressionMetrics)> {
        self.dimensions.iter().map(|(name, m)| (name.as_str(), m))
    }
}

/// Compute MAE, RMSE and R² between paired predictions and actuals.
///
/// Callers guarantee equal, non-zero lengths.
pub(crate) fn regression_metrics(predictions: &[f64], actuals: &[f64]) -> RegressionMetrics {
    let n = actuals.len() as f64;

    let mut abs_sum = 0.0f64;
    let mut sq_sum = 0.0f64;
    for (&p, &a) in predictions.iter().zip(actuals) {
        let residual = p - a;
        abs_sum += residual.abs();
        sq_sum += residual * residual;
    }

    let mean_actual = actuals.iter().sum::<f64>() / n;
    let ss_tot: f64 = actuals
        .iter()
        .map(|&a| (a - mean_actual) * (a - mean_actual))
        .sum();
    // Constant actuals: the computed mean can miss the shared value by an ulp,
    // leaving a tiny non-zero SS_tot.
    let constant = actuals.windows(2).all(|w| w[0] == w[1]);
    let r2 = if constant || ss_tot == 0.0 {
        f64::NAN
    } else {
        1.0 - sq_sum / ss_tot
    };

    RegressionMetrics {
        mae: abs_sum / n,
        rmse: (sq_sum / n).sqrt(),
        r2,
        n_examples: actuals.len(),
    }
}

impl RandomForest {
    /// Evaluate the forest against the targets of `dataset`.
    ///
    /// Features are matched by name, so the dataset may carry extra columns
    /// or order them differently.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::EmptyDataset`] | `dataset` holds no examples |
    /// | [`RfError::MissingTargetDimension`] | a model dimension is absent from the dataset |
    /// | [`RfError::MissingFeature`] | a walked split tests a feature the dataset lacks |
    #[instrument(skip_all, fields(n_examples = dataset.n_examples()))]
    pub fn evaluate(&self, dataset: &Dataset) -> Result<EvaluationResult, RfError> {
        if dataset.is_empty() {
            return Err(RfError::EmptyDataset);
        }

        let target_columns: Vec<&[f64]> = self
            .target_names
            .iter()
            .map(|name| {
                dataset
                    .target_index(name)
                    .map(|d| dataset.target_column(d))
                    .ok_or_else(|| RfError::MissingTargetDimension {
                        dimension: name.clone(),
                    })
            })
            .collect::<Result<_, _>>()?;

        // Model feature position -> dataset column, if the dataset has it.
        let feature_map: Vec<Option<usize>> = self
            .feature_names
            .iter()
            .map(|name| dataset.feature_index(name))
            .collect();

        let predictions: Vec<Vec<f64>> = (0..dataset.n_examples())
            .into_par_iter()
            .map(|row| {
                let sample: Vec<Option<f64>> = feature_map
                    .iter()
                    .map(|col| col.map(|j| dataset.column(j)[row]))
                    .collect();
                self.predict_aligned(&sample)
            })
            .collect::<Result<_, _>>()?;

        let dimensions: Vec<(String, RegressionMetrics)> = self
            .target_names
            .iter()
            .zip(&target_columns)
            .enumerate()
            .map(|(d, (name, actuals))| {
                let predicted: Vec<f64> = predictions.iter().map(|p| p[d]).collect();
                (name.clone(), regression_metrics(&predicted, actuals))
            })
            .collect();

        for (name, m) in &dimensions {
            info!(dimension = %name, mae = m.mae, rmse = m.rmse, r2 = m.r2, "evaluation complete");
        }

        Ok(EvaluationResult::new(dimensions))
    }
}
