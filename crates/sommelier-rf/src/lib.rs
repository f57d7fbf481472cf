//! Random-forest regression: train, evaluate, predict, persist.
//!
//! Provides CART regression trees grown on row/feature-subsampled bags,
//! an averaging ensemble trained in parallel via rayon, MAE/RMSE/R²
//! evaluation, out-of-bag scoring, k-fold cross-validation and versioned
//! model serialization.
//!
//! ```no_run
//! use sommelier_rf::{Dataset, Example, RandomForestConfig, train_test_split};
//!
//! # fn main() -> Result<(), sommelier_rf::RfError> {
//! let examples: Vec<Example> = (0..100)
//!     .map(|i| {
//!         Example::new()
//!             .with_feature("alcohol", 9.0 + i as f64 * 0.05)
//!             .with_target("quality", 5.0 + (i % 3) as f64)
//!     })
//!     .collect();
//! let dataset = Dataset::from_examples(&examples)?;
//! let (train, test) = train_test_split(&dataset, 0.7, 1)?;
//! let forest = RandomForestConfig::new(10)?.with_seed(1).fit(&train)?.into_forest();
//! let metrics = forest.evaluate(&test)?;
//! # Ok(())
//! # }
//! ```

mod config;
mod cv;
mod dataset;
mod error;
mod eval;
mod forest;
mod node;
mod oob;
mod predict;
mod result;
mod serialize;
mod split;
mod splitter;
mod tree;

pub use config::{OobMode, RandomForestConfig};
pub use cv::{CrossValidation, CrossValidationResult};
pub use dataset::{Dataset, Example};
pub use error::{ErrorKind, RfError};
pub use eval::{EvaluationResult, RegressionMetrics};
pub use forest::RandomForest;
pub use node::{FeatureIndex, Impurity, Node};
pub use oob::OobScore;
pub use predict::{Combiner, Prediction};
pub use result::{RandomForestResult, TrainingMetadata};
pub use serialize::{deserialize, serialize};
pub use split::SplitCriterion;
pub use splitter::train_test_split;
pub use tree::{DecisionTree, DecisionTreeConfig};
