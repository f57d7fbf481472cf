use std::fmt;
use std::path::PathBuf;

/// Coarse classification of an [`RfError`].
///
/// Every error aborts the operation that raised it; the kind tells a caller
/// (typically the CLI) which family of failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid hyperparameters or split/fold settings.
    Config,
    /// Training data cannot produce a model (empty bag, inconsistent schema).
    Build,
    /// An example lacks a feature a trained tree needs at predict time.
    MissingFeature,
    /// A model artifact is malformed or has an incompatible version.
    CorruptArtifact,
    /// A file could not be read or written.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Config => "ConfigError",
            ErrorKind::Build => "BuildError",
            ErrorKind::MissingFeature => "MissingFeatureError",
            ErrorKind::CorruptArtifact => "CorruptArtifactError",
            ErrorKind::Io => "IOError",
        };
        f.write_str(name)
    }
}

/// Errors from random-forest training, prediction, evaluation and persistence.
#[derive(Debug, thiserror::Error)]
pub enum RfError {
    /// Returned when n_trees is zero.
    #[error("n_trees must be at least 1, got {n_trees}")]
    InvalidTreeCount {
        /// The invalid n_trees value provided.
        n_trees: usize,
    },

    /// Returned when max_depth is `Some(0)`.
    #[error("max_depth must be at least 1, got {max_depth}")]
    InvalidMaxDepth {
        /// The invalid max_depth value provided.
        max_depth: usize,
    },

    /// Returned when min_examples_per_split is zero.
    #[error("min_examples_per_split must be at least 1, got {min_examples_per_split}")]
    InvalidMinExamplesPerSplit {
        /// The invalid value provided.
        min_examples_per_split: usize,
    },

    /// Returned when min_impurity_decrease is negative or not finite.
    #[error("min_impurity_decrease must be finite and >= 0.0, got {value}")]
    InvalidMinImpurityDecrease {
        /// The invalid value provided.
        value: f64,
    },

    /// Returned when a row or feature subsample ratio is not in (0.0, 1.0].
    #[error("{name} must be in (0.0, 1.0], got {ratio}")]
    InvalidSubsampleRatio {
        /// Which ratio was rejected.
        name: &'static str,
        /// The invalid ratio.
        ratio: f64,
    },

    /// Returned when the train fraction of a train/test split is not in (0.0, 1.0).
    #[error("train_fraction must be in (0.0, 1.0), got {fraction}")]
    InvalidTrainFraction {
        /// The invalid fraction.
        fraction: f64,
    },

    /// Returned when n_folds is less than 2.
    #[error("n_folds must be at least 2, got {n_folds}")]
    InvalidFoldCount {
        /// The invalid n_folds value provided.
        n_folds: usize,
    },

    /// Returned when the dataset has fewer examples than requested folds.
    #[error("dataset has {n_examples} examples, need at least {n_folds} for {n_folds}-fold cross-validation")]
    TooFewExamplesForFolds {
        /// Number of examples available.
        n_examples: usize,
        /// The requested number of folds.
        n_folds: usize,
    },

    /// Returned when a dataset has zero examples.
    #[error("dataset has zero examples")]
    EmptyDataset,

    /// Returned when a tree is asked to grow from an empty bag.
    #[error("cannot build a tree from an empty bag")]
    EmptyBag,

    /// Returned when a dataset has zero feature columns.
    #[error("dataset has zero feature columns")]
    ZeroFeatures,

    /// Returned when a dataset has zero target dimensions.
    #[error("dataset has zero target dimensions")]
    ZeroTargets,

    /// Returned when an example's feature names differ from the first example's.
    #[error("example {example_index} has a different feature set than example 0")]
    InconsistentFeatureSchema {
        /// Zero-based index of the offending example.
        example_index: usize,
    },

    /// Returned when an example's target names differ from the first example's.
    #[error("example {example_index} has a different target set than example 0")]
    InconsistentTargetSchema {
        /// Zero-based index of the offending example.
        example_index: usize,
    },

    /// Returned when a column name appears more than once across features and targets.
    #[error("column \"{column}\" appears more than once")]
    DuplicateColumn {
        /// The repeated column name.
        column: String,
    },

    /// Returned when columns passed to a dataset constructor differ in length.
    #[error("column \"{column}\" has {got} values, expected {expected}")]
    ColumnLengthMismatch {
        /// Name of the offending column.
        column: String,
        /// Expected number of values.
        expected: usize,
        /// Actual number of values.
        got: usize,
    },

    /// Returned when a feature or target value is NaN or infinite.
    #[error("non-finite value in column \"{column}\" at example {example_index}")]
    NonFiniteValue {
        /// Name of the column holding the value.
        column: String,
        /// Zero-based index of the offending example.
        example_index: usize,
    },

    /// Returned when an evaluation dataset lacks a dimension the model predicts.
    #[error("dataset has no target named \"{dimension}\"")]
    MissingTargetDimension {
        /// The model dimension absent from the dataset.
        dimension: String,
    },

    /// Returned when OOB evaluation fails (no example has any OOB tree).
    #[error("OOB evaluation failed: {reason}")]
    OobEvaluationFailed {
        /// Human-readable description of why OOB evaluation failed.
        reason: String,
    },

    /// Returned when a split on the prediction path references an absent feature.
    #[error("example is missing feature \"{feature}\" required by the model")]
    MissingFeature {
        /// Name of the missing feature.
        feature: String,
    },

    /// Returned when model serialization fails.
    #[error("failed to serialize model")]
    SerializeModel {
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when artifact bytes cannot be decoded.
    #[error("failed to decode model artifact")]
    DecodeModel {
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when an artifact carries an incompatible format version.
    #[error("incompatible model version: expected {expected}, found {found}")]
    IncompatibleModelVersion {
        /// The model format version this build expects.
        expected: u32,
        /// The model format version found in the artifact.
        found: u32,
    },

    /// Returned when an artifact decodes but describes an invalid model.
    #[error("corrupt model artifact: {reason}")]
    CorruptArtifact {
        /// What was wrong with the decoded model.
        reason: String,
    },

    /// Returned when writing the model file fails.
    #[error("failed to write model to {path}")]
    WriteModel {
        /// Path to the file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when reading the model file fails.
    #[error("failed to read model from {path}")]
    ReadModel {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

impl RfError {
    /// Return the error family this error belongs to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            RfError::InvalidTreeCount { .. }
            | RfError::InvalidMaxDepth { .. }
            | RfError::InvalidMinExamplesPerSplit { .. }
            | RfError::InvalidMinImpurityDecrease { .. }
            | RfError::InvalidSubsampleRatio { .. }
            | RfError::InvalidTrainFraction { .. }
            | RfError::InvalidFoldCount { .. }
            | RfError::TooFewExamplesForFolds { .. } => ErrorKind::Config,
            RfError::EmptyDataset
            | RfError::EmptyBag
            | RfError::ZeroFeatures
            | RfError::ZeroTargets
            | RfError::InconsistentFeatureSchema { .. }
            | RfError::InconsistentTargetSchema { .. }
            | RfError::DuplicateColumn { .. }
            | RfError::ColumnLengthMismatch { .. }
            | RfError::NonFiniteValue { .. }
            | RfError::MissingTargetDimension { .. }
            | RfError::OobEvaluationFailed { .. } => ErrorKind::Build,
            RfError::MissingFeature { .. } => ErrorKind::MissingFeature,
            RfError::SerializeModel { .. }
            | RfError::DecodeModel { .. }
            | RfError::IncompatibleModelVersion { .. }
            | RfError::CorruptArtifact { .. } => ErrorKind::CorruptArtifact,
            RfError::WriteModel { .. } | RfError::ReadModel { .. } => ErrorKind::Io,
        }
    }
}
