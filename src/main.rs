use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use sommelier_io::{DatasetReader, IoError};
use sommelier_rf::{
    CrossValidation, Dataset, ErrorKind, EvaluationResult, Example, OobMode, RandomForest,
    RandomForestConfig, RfError, train_test_split,
};

/// Feature values of the reference red wine used when `predict` gets no `--feature`.
const REFERENCE_WINE: [(&str, f64); 11] = [
    ("fixed acidity", 7.4),
    ("volatile acidity", 0.7),
    ("citric acid", 0.47),
    ("residual sugar", 1.9),
    ("chlorides", 0.076),
    ("free sulfur dioxide", 11.0),
    ("total sulfur dioxide", 34.0),
    ("density", 0.9978),
    ("pH", 3.51),
    ("sulphates", 0.56),
    ("alcohol", 9.4),
];

#[derive(Parser)]
#[command(name = "sommelier")]
#[command(about = "Random-forest regression for wine quality and other tabular data")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

/// Where and how to read the training table.
#[derive(Args, Debug, Clone)]
struct DataArgs {
    /// Path to the delimited input file (header row required)
    #[arg(long)]
    data: PathBuf,

    /// Field delimiter (a single ASCII character)
    #[arg(long, default_value = ";", value_parser = parse_delimiter)]
    delimiter: u8,

    /// Target column; repeat for multi-output regression
    #[arg(long = "target", default_values_t = [String::from("quality")])]
    targets: Vec<String>,
}

/// Shared random-forest hyperparameters.
#[derive(Args, Debug, Clone)]
struct ForestArgs {
    /// Number of trees in the forest
    #[arg(long, default_value_t = 10)]
    n_trees: usize,

    /// Maximum tree depth (unlimited if not set)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Minimum examples on each side of a split
    #[arg(long, default_value_t = 5)]
    min_examples_per_split: usize,

    /// Minimum impurity decrease for a split to be kept
    #[arg(long, default_value_t = 0.001)]
    min_impurity_decrease: f64,

    /// Fraction of training rows drawn (without replacement) per tree
    #[arg(long, default_value_t = 0.7)]
    row_subsample_ratio: f64,

    /// Fraction of features considered at each split
    #[arg(long, default_value_t = 0.7)]
    feature_subsample_ratio: f64,

    /// Base seed for tree construction
    #[arg(long, default_value_t = 12345)]
    seed: u64,
}

impl ForestArgs {
    fn config(&self) -> Result<RandomForestConfig> {
        let config = RandomForestConfig::new(self.n_trees)?
            .with_max_depth(self.max_depth)
            .with_min_examples_per_split(self.min_examples_per_split)
            .with_min_impurity_decrease(self.min_impurity_decrease)
            .with_row_subsample_ratio(self.row_subsample_ratio)
            .with_feature_subsample_ratio(self.feature_subsample_ratio)
            .with_seed(self.seed);
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Split the data, train a forest, report test metrics and save the model
    Train {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        forest: ForestArgs,

        /// Fraction of rows used for training; the rest is the test split
        #[arg(long, default_value_t = 0.7)]
        train_fraction: f64,

        /// Seed for the train/test shuffle
        #[arg(long, default_value_t = 1)]
        split_seed: u64,

        /// Also report out-of-bag metrics on the training split
        #[arg(long, default_value_t = false)]
        oob: bool,

        /// Output path for the trained model
        #[arg(long, default_value = "wine.model")]
        model: PathBuf,
    },

    /// Predict one example with a saved model
    Predict {
        /// Path to the trained model
        #[arg(long)]
        model: PathBuf,

        /// Feature value as NAME=VALUE; repeat for each feature.
        /// Without any, the reference red wine is used.
        #[arg(long = "feature", value_parser = parse_feature)]
        features: Vec<(String, f64)>,
    },

    /// Estimate generalisation error with k-fold cross-validation
    CrossValidate {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        forest: ForestArgs,

        /// Number of folds
        #[arg(long, default_value_t = 5)]
        folds: usize,

        /// Seed for the fold shuffle
        #[arg(long, default_value_t = 1)]
        fold_seed: u64,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct DimensionMetrics {
    dimension: String,
    mae: f64,
    rmse: f64,
    /// `null` when the evaluated targets are constant.
    r2: f64,
    n_examples: usize,
}

#[derive(Serialize)]
struct TrainOutput {
    model: PathBuf,
    n_train: usize,
    n_test: usize,
    n_trees: usize,
    n_features: usize,
    bag_size: usize,
    test_metrics: Vec<DimensionMetrics>,
    oob_metrics: Option<Vec<DimensionMetrics>>,
}

#[derive(Serialize)]
struct DimensionValue {
    dimension: String,
    value: f64,
}

#[derive(Serialize)]
struct PredictOutput {
    model: PathBuf,
    model_n_trees: usize,
    model_n_features: usize,
    predictions: Vec<DimensionValue>,
}

#[derive(Serialize)]
struct CrossValidateOutput {
    n_folds: usize,
    n_examples: usize,
    mean_metrics: Vec<DimensionMetrics>,
    fold_metrics: Vec<Vec<DimensionMetrics>>,
}

fn metrics_output(result: &EvaluationResult) -> Vec<DimensionMetrics> {
    result
        .iter()
        .map(|(dimension, m)| DimensionMetrics {
            dimension: dimension.to_string(),
            mae: m.mae,
            rmse: m.rmse,
            r2: m.r2,
            n_examples: m.n_examples,
        })
        .collect()
}

fn parse_feature(s: &str) -> std::result::Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got \"{s}\""))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty feature name in \"{s}\""));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("feature \"{name}\" has a non-numeric value"))?;
    if !value.is_finite() {
        return Err(format!("feature \"{name}\" must be finite"));
    }
    Ok((name.to_string(), value))
}

fn parse_delimiter(s: &str) -> std::result::Result<u8, String> {
    match s.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(format!("expected a single ASCII character, got \"{s}\"")),
    }
}

fn read_dataset(args: &DataArgs) -> Result<Dataset> {
    let dataset = DatasetReader::new(&args.data)
        .with_delimiter(args.delimiter)
        .with_targets(args.targets.iter().cloned())
        .read()
        .with_context(|| format!("failed to read {}", args.data.display()))?;
    Ok(dataset)
}

/// Find the error family of the first recognised cause in the chain.
///
/// Library errors carry their own kind. A thread pool that cannot be built
/// is a configuration problem. Failures to encode or write the JSON summary
/// are I/O.
fn error_kind(err: &anyhow::Error) -> ErrorKind {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<RfError>() {
            return e.kind();
        }
        if let Some(e) = cause.downcast_ref::<IoError>() {
            return e.kind();
        }
        if cause.is::<rayon::ThreadPoolBuildError>() {
            return ErrorKind::Config;
        }
        if cause.is::<serde_json::Error>() || cause.is::<std::io::Error>() {
            return ErrorKind::Io;
        }
    }
    ErrorKind::Io
}

fn run(cli: Cli) -> Result<()> {
    // Configure Rayon thread pool
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Train {
            data,
            forest,
            train_fraction,
            split_seed,
            oob,
            model,
        } => {
            let oob_mode = if oob { OobMode::Enabled } else { OobMode::Disabled };
            let config = forest.config()?.with_oob_mode(oob_mode);

            // 1. Read and split
            let dataset = read_dataset(&data)?;
            let (train, test) = train_test_split(&dataset, train_fraction, split_seed)?;
            info!(
                n_train = train.n_examples(),
                n_test = test.n_examples(),
                "dataset split"
            );

            // 2. Train
            let result = config.fit(&train).context("training failed")?;

            // 3. Evaluate on the held-out split
            let metrics = result
                .forest()
                .evaluate(&test)
                .context("evaluation on the test split failed")?;

            // 4. Save model
            result
                .forest()
                .save(&model)
                .context("failed to save model")?;

            // 5. Print summary
            let meta = result.metadata();
            let output = TrainOutput {
                model,
                n_train: train.n_examples(),
                n_test: test.n_examples(),
                n_trees: meta.n_trees,
                n_features: meta.n_features,
                bag_size: meta.bag_size,
                test_metrics: metrics_output(&metrics),
                oob_metrics: result.oob_score().map(|s| metrics_output(&s.metrics)),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Predict { model, features } => {
            // 1. Load model
            let forest = RandomForest::load(&model).context("failed to load model")?;
            info!(
                n_trees = forest.n_trees(),
                n_features = forest.n_features(),
                "model loaded"
            );

            // 2. Build the example
            let example = if features.is_empty() {
                info!("no --feature given, using the reference wine");
                REFERENCE_WINE
                    .iter()
                    .fold(Example::new(), |e, &(name, v)| e.with_feature(name, v))
            } else {
                features
                    .into_iter()
                    .fold(Example::new(), |e, (name, v)| e.with_feature(name, v))
            };

            // 3. Predict
            let prediction = forest.predict(&example).context("prediction failed")?;

            // 4. Print summary
            let output = PredictOutput {
                model,
                model_n_trees: forest.n_trees(),
                model_n_features: forest.n_features(),
                predictions: prediction
                    .iter()
                    .map(|(dimension, value)| DimensionValue {
                        dimension: dimension.to_string(),
                        value,
                    })
                    .collect(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::CrossValidate {
            data,
            forest,
            folds,
            fold_seed,
        } => {
            let config = forest.config()?;
            let cv = CrossValidation::new(folds)?.with_seed(fold_seed);

            let dataset = read_dataset(&data)?;
            let result = cv
                .evaluate(&config, &dataset)
                .context("cross-validation failed")?;

            let output = CrossValidateOutput {
                n_folds: result.n_folds,
                n_examples: result.n_examples,
                mean_metrics: metrics_output(&result.mean_metrics),
                fold_metrics: result.fold_results.iter().map(metrics_output).collect(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}: {err:#}", error_kind(&err));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_feature_accepts_spaces_in_names() {
        assert_eq!(
            parse_feature("fixed acidity=7.4").unwrap(),
            ("fixed acidity".to_string(), 7.4)
        );
        assert_eq!(parse_feature(" pH = 3.51 ").unwrap(), ("pH".to_string(), 3.51));
    }

    #[test]
    fn parse_feature_rejects_bad_input() {
        assert!(parse_feature("alcohol").is_err());
        assert!(parse_feature("=9.4").is_err());
        assert!(parse_feature("alcohol=high").is_err());
        assert!(parse_feature("alcohol=NaN").is_err());
    }

    #[test]
    fn error_kind_found_through_context() {
        let err = anyhow::Error::new(RfError::InvalidTreeCount { n_trees: 0 })
            .context("building config");
        assert_eq!(error_kind(&err), ErrorKind::Config);

        let err = anyhow::Error::new(RfError::MissingFeature {
            feature: "alcohol".into(),
        })
        .context("prediction failed");
        assert_eq!(error_kind(&err).to_string(), "MissingFeatureError");
    }

    #[test]
    fn error_kind_for_non_library_causes() {
        let json_err = serde_json::from_str::<f64>("not json").unwrap_err();
        let err = anyhow::Error::new(json_err).context("failed to print summary");
        assert_eq!(error_kind(&err), ErrorKind::Io);

        let err = anyhow::anyhow!("something unexpected");
        assert_eq!(error_kind(&err), ErrorKind::Io);
    }

    #[test]
    fn delimiter_must_be_one_ascii_character() {
        assert_eq!(parse_delimiter(",").unwrap(), b',');
        assert_eq!(parse_delimiter("\t").unwrap(), b'\t');
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter(";;").is_err());
        assert!(parse_delimiter("§").is_err());

        let parsed = Cli::try_parse_from([
            "sommelier", "train", "--data", "wine.csv", "--delimiter", "§",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn reference_wine_has_eleven_features() {
        let names: std::collections::BTreeSet<&str> =
            REFERENCE_WINE.iter().map(|&(name, _)| name).collect();
        assert_eq!(names.len(), 11);
    }

    #[test]
    fn cli_parses_defaults() {
        let cli = Cli::try_parse_from(["sommelier", "train", "--data", "wine.csv"]).unwrap();
        match cli.command {
            Command::Train {
                data,
                forest,
                train_fraction,
                split_seed,
                ..
            } => {
                assert_eq!(data.delimiter, b';');
                assert_eq!(data.targets, vec!["quality".to_string()]);
                assert_eq!(forest.n_trees, 10);
                assert!((train_fraction - 0.7).abs() < f64::EPSILON);
                assert_eq!(split_seed, 1);
            }
            _ => panic!("expected train"),
        }
    }
}
